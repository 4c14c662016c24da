//! Resource Model
//!
//! A [`Resource`] is one northbound record of a given kind. Everything the
//! source record carried lives in `fields`; per-kind typed accessors are
//! exposed through [`ResourceView`].

use super::registry::ResourceKind;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// Field map of one parsed record
pub type FieldMap = Map<String, Value>;

/// Field holding the owning router of a router port
pub const OWNER_FIELD: &str = "router";

/// Keys the serialized envelope carries itself
const ENVELOPE_KEYS: &[&str] = &["id", "name", "kind", "lastUpdated"];

/// Envelope key holding a router's nested ports
const PORTS_KEY: &str = "ports";

#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub id: String,
    pub name: String,
    pub kind: ResourceKind,
    pub fields: FieldMap,
    pub last_updated: DateTime<Utc>,
    /// Owned router ports. Only ever populated on routers.
    pub ports: Vec<Resource>,
}

impl Resource {
    /// Build a resource from one parsed record.
    ///
    /// `source` is the text the record came from; it becomes the name when
    /// neither a name nor an id can be recovered.
    pub fn from_fields(kind: ResourceKind, fields: FieldMap, source: &str) -> Self {
        let id = fields
            .get("_uuid")
            .or_else(|| fields.get("uuid"))
            .and_then(atom_string)
            .unwrap_or_default();

        let name = match fields.get("name").and_then(atom_string) {
            Some(name) if !name.is_empty() => name,
            _ if !id.is_empty() => synthesized_name(kind, &id),
            _ => source.to_string(),
        };

        Self {
            id,
            name,
            kind,
            fields,
            last_updated: Utc::now(),
            ports: Vec::new(),
        }
    }

    /// Stamp the owning router onto this resource
    pub fn set_owner(&mut self, owner_id: &str) {
        self.fields
            .insert(OWNER_FIELD.to_string(), Value::String(owner_id.to_string()));
    }

    /// `(kind, id)` when the id is known
    pub fn key(&self) -> Option<(ResourceKind, &str)> {
        (!self.id.is_empty()).then_some((self.kind, self.id.as_str()))
    }

    /// Get a field rendered as a plain string
    pub fn field_str(&self, key: &str) -> String {
        self.fields.get(key).and_then(atom_string).unwrap_or_default()
    }

    fn field_value(&self, key: &str) -> Value {
        self.fields.get(key).cloned().unwrap_or(Value::Null)
    }

    fn field_i64(&self, key: &str) -> i64 {
        match self.fields.get(key) {
            Some(Value::Number(n)) => n.as_i64().unwrap_or_default(),
            Some(Value::String(s)) => s.trim().parse().unwrap_or_default(),
            _ => 0,
        }
    }

    fn field_list(&self, key: &str) -> Vec<String> {
        match self.fields.get(key) {
            Some(Value::Array(items)) if is_tagged(items, "set") => items
                .get(1)
                .and_then(Value::as_array)
                .map(|set| set.iter().filter_map(atom_string).collect())
                .unwrap_or_default(),
            Some(value @ Value::Array(items)) if is_tagged(items, "uuid") => {
                atom_string(value).into_iter().collect()
            }
            Some(Value::Array(items)) => items.iter().filter_map(atom_string).collect(),
            Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
            _ => Vec::new(),
        }
    }

    fn field_map(&self, key: &str) -> FieldMap {
        match self.fields.get(key) {
            Some(Value::Object(map)) => map.clone(),
            Some(Value::Array(items)) if is_tagged(items, "map") => items
                .get(1)
                .and_then(Value::as_array)
                .map(|pairs| {
                    pairs
                        .iter()
                        .filter_map(|pair| {
                            let pair = pair.as_array()?;
                            let key = atom_string(pair.first()?)?;
                            Some((key, pair.get(1).cloned().unwrap_or(Value::Null)))
                        })
                        .collect()
                })
                .unwrap_or_default(),
            _ => FieldMap::new(),
        }
    }

    /// Typed per-kind view over `fields`
    pub fn view(&self) -> ResourceView<'_> {
        match self.kind {
            ResourceKind::Switch => ResourceView::Switch {
                ports: self.field_list("ports"),
            },
            ResourceKind::Router => ResourceView::Router { ports: &self.ports },
            ResourceKind::RouterPort => ResourceView::RouterPort {
                mac: self.field_str("mac"),
                network: self
                    .field_list("networks")
                    .into_iter()
                    .next()
                    .unwrap_or_else(|| self.field_str("network")),
                router: self.field_str(OWNER_FIELD),
            },
            ResourceKind::SwitchPort => ResourceView::SwitchPort {
                port_type: self.field_str("type"),
                addresses: self.field_list("addresses"),
                switch: self.field_str("switch"),
            },
            ResourceKind::LoadBalancer => ResourceView::LoadBalancer {
                vips: self.field_map("vips"),
                protocol: self.field_str("protocol"),
            },
            ResourceKind::Acl => ResourceView::Acl {
                direction: self.field_str("direction"),
                priority: self.field_i64("priority"),
                match_expr: self.field_str("match"),
                action: self.field_str("action"),
            },
            ResourceKind::AddressSet => ResourceView::AddressSet {
                addresses: self.field_list("addresses"),
            },
            ResourceKind::DhcpOptions => ResourceView::DhcpOptions {
                cidr: self.field_str("cidr"),
                options: self.field_map("options"),
            },
            ResourceKind::Qos => ResourceView::Qos {
                direction: self.field_str("direction"),
                priority: self.field_i64("priority"),
                match_expr: self.field_str("match"),
                action: self.field_value("action"),
            },
            ResourceKind::Nat => ResourceView::Nat {
                nat_type: self.field_str("type"),
                external_ip: self.field_str("external_ip"),
                logical_ip: self.field_str("logical_ip"),
                logical_port: self.field_str("logical_port"),
            },
        }
    }

    /// Uniform field-map form: envelope keys first, then every source field.
    /// Routers nest their ports in place of the raw `ports` column; other
    /// kinds keep theirs.
    pub fn to_field_map(&self) -> FieldMap {
        let is_router = self.kind == ResourceKind::Router;
        let mut out = FieldMap::new();
        out.insert("id".to_string(), Value::String(self.id.clone()));
        out.insert("name".to_string(), Value::String(self.name.clone()));
        out.insert("kind".to_string(), Value::String(self.kind.key().to_string()));

        for (key, value) in &self.fields {
            let shadowed = ENVELOPE_KEYS.contains(&key.as_str()) || (is_router && key == PORTS_KEY);
            if !shadowed {
                out.insert(key.clone(), value.clone());
            }
        }

        out.insert(
            "lastUpdated".to_string(),
            Value::String(self.last_updated.to_rfc3339_opts(SecondsFormat::Micros, true)),
        );

        if is_router {
            let ports = self.ports.iter().map(|p| Value::Object(p.to_field_map()));
            out.insert(PORTS_KEY.to_string(), Value::Array(ports.collect()));
        }

        out
    }
}

impl Serialize for Resource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_field_map().serialize(serializer)
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} ({})", self.kind, self.name, self.id)
    }
}

/// Typed per-kind projection of a resource's fields
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceView<'a> {
    Switch {
        ports: Vec<String>,
    },
    Router {
        ports: &'a [Resource],
    },
    RouterPort {
        mac: String,
        network: String,
        router: String,
    },
    SwitchPort {
        port_type: String,
        addresses: Vec<String>,
        switch: String,
    },
    LoadBalancer {
        vips: FieldMap,
        protocol: String,
    },
    Acl {
        direction: String,
        priority: i64,
        match_expr: String,
        action: String,
    },
    AddressSet {
        addresses: Vec<String>,
    },
    DhcpOptions {
        cidr: String,
        options: FieldMap,
    },
    Qos {
        direction: String,
        priority: i64,
        match_expr: String,
        action: Value,
    },
    Nat {
        nat_type: String,
        external_ip: String,
        logical_ip: String,
        logical_port: String,
    },
}

/// `<Label>-<first 8 chars of id>`
pub fn synthesized_name(kind: ResourceKind, id: &str) -> String {
    let prefix: String = id.chars().take(8).collect();
    format!("{}-{}", kind.label(), prefix)
}

fn is_tagged(items: &[Value], tag: &str) -> bool {
    items.len() == 2 && items[0].as_str() == Some(tag)
}

/// Render a scalar as a string, unwrapping OVSDB `["uuid", "..."]` atoms.
/// Empty sets and compound values yield `None`.
fn atom_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) if is_tagged(items, "uuid") || is_tagged(items, "named-uuid") => {
            items[1].as_str().map(str::to_string)
        }
        _ => None,
    }
}
