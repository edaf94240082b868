//! Network entity kinds and their write payloads.
//!
//! Each kind maps onto one PostGIS table with an integer primary key, a
//! handful of attribute columns, an SRID 4326 `geom` column and a
//! `created_at` timestamp. Payloads carry geometry as WKT.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::query::BindValue;

/// Geometry type stored in an entity's `geom` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeometryKind {
    Point,
    LineString,
}

impl GeometryKind {
    pub fn wkt_tag(&self) -> &'static str {
        match self {
            GeometryKind::Point => "POINT",
            GeometryKind::LineString => "LINESTRING",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Substation,
    Feeder,
    Transformer,
    Pole,
    Conductor,
    Switch,
    Fuse,
}

impl EntityKind {
    pub const ALL: [EntityKind; 7] = [
        EntityKind::Substation,
        EntityKind::Feeder,
        EntityKind::Transformer,
        EntityKind::Pole,
        EntityKind::Conductor,
        EntityKind::Switch,
        EntityKind::Fuse,
    ];

    /// Table name, also the URL collection segment.
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Substation => "substations",
            EntityKind::Feeder => "feeders",
            EntityKind::Transformer => "transformers",
            EntityKind::Pole => "poles",
            EntityKind::Conductor => "conductors",
            EntityKind::Switch => "switches",
            EntityKind::Fuse => "fuses",
        }
    }

    pub fn id_column(&self) -> &'static str {
        match self {
            EntityKind::Substation => "substation_id",
            EntityKind::Feeder => "feeder_id",
            EntityKind::Transformer => "transformer_id",
            EntityKind::Pole => "pole_id",
            EntityKind::Conductor => "conductor_id",
            EntityKind::Switch => "switch_id",
            EntityKind::Fuse => "fuse_id",
        }
    }

    /// Human label used in "not found" messages.
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Substation => "Substation",
            EntityKind::Feeder => "Feeder",
            EntityKind::Transformer => "Transformer",
            EntityKind::Pole => "Pole",
            EntityKind::Conductor => "Conductor",
            EntityKind::Switch => "Switch",
            EntityKind::Fuse => "Fuse",
        }
    }

    /// Attribute columns in write order, excluding the id and geometry.
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            EntityKind::Substation => &["substation_name", "voltage_level_kv", "status"],
            EntityKind::Feeder => &["feeder_name", "substation_id", "voltage_level_kv"],
            EntityKind::Transformer => &["transformer_name", "feeder_id", "capacity_kva", "status"],
            EntityKind::Pole => &[
                "transformer_id",
                "material_type",
                "height_meters",
                "installation_year",
            ],
            EntityKind::Conductor => &[
                "start_pole_id",
                "end_pole_id",
                "conductor_type",
                "voltage_rating_kv",
            ],
            EntityKind::Switch => &["conductor_id", "switch_type", "operational_status"],
            EntityKind::Fuse => &["conductor_id", "fuse_rating_amps", "operational_status"],
        }
    }

    pub fn geometry(&self) -> GeometryKind {
        match self {
            EntityKind::Feeder | EntityKind::Conductor => GeometryKind::LineString,
            _ => GeometryKind::Point,
        }
    }
}

/// A create/update body for one entity kind.
pub trait EntityPayload: DeserializeOwned + Send + Sync + 'static {
    const KIND: EntityKind;

    /// WKT geometry.
    fn geom(&self) -> &str;

    /// Attribute values, aligned with [`EntityKind::columns`].
    fn values(&self) -> Vec<BindValue>;
}

fn default_active() -> Option<String> {
    Some("Active".to_string())
}

fn default_closed() -> Option<String> {
    Some("Closed".to_string())
}

fn default_operational() -> Option<String> {
    Some("Operational".to_string())
}

/// Replace an explicit null with the column default.
fn or_default(value: &Option<String>, default: fn() -> Option<String>) -> BindValue {
    BindValue::Text(value.clone().or_else(default))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubstationPayload {
    pub substation_name: String,
    pub voltage_level_kv: f64,
    #[serde(default = "default_active")]
    pub status: Option<String>,
    pub geom: String,
}

impl EntityPayload for SubstationPayload {
    const KIND: EntityKind = EntityKind::Substation;

    fn geom(&self) -> &str {
        &self.geom
    }

    fn values(&self) -> Vec<BindValue> {
        vec![
            self.substation_name.clone().into(),
            self.voltage_level_kv.into(),
            or_default(&self.status, default_active),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeederPayload {
    pub feeder_name: String,
    pub substation_id: i64,
    #[serde(default)]
    pub voltage_level_kv: Option<f64>,
    pub geom: String,
}

impl EntityPayload for FeederPayload {
    const KIND: EntityKind = EntityKind::Feeder;

    fn geom(&self) -> &str {
        &self.geom
    }

    fn values(&self) -> Vec<BindValue> {
        vec![
            self.feeder_name.clone().into(),
            self.substation_id.into(),
            self.voltage_level_kv.into(),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransformerPayload {
    pub transformer_name: String,
    pub feeder_id: i64,
    pub capacity_kva: f64,
    #[serde(default = "default_active")]
    pub status: Option<String>,
    pub geom: String,
}

impl EntityPayload for TransformerPayload {
    const KIND: EntityKind = EntityKind::Transformer;

    fn geom(&self) -> &str {
        &self.geom
    }

    fn values(&self) -> Vec<BindValue> {
        vec![
            self.transformer_name.clone().into(),
            self.feeder_id.into(),
            self.capacity_kva.into(),
            or_default(&self.status, default_active),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolePayload {
    #[serde(default)]
    pub transformer_id: Option<i64>,
    #[serde(default)]
    pub material_type: Option<String>,
    #[serde(default)]
    pub height_meters: Option<f64>,
    #[serde(default)]
    pub installation_year: Option<i64>,
    pub geom: String,
}

impl EntityPayload for PolePayload {
    const KIND: EntityKind = EntityKind::Pole;

    fn geom(&self) -> &str {
        &self.geom
    }

    fn values(&self) -> Vec<BindValue> {
        vec![
            self.transformer_id.into(),
            self.material_type.clone().into(),
            self.height_meters.into(),
            self.installation_year.into(),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConductorPayload {
    #[serde(default)]
    pub start_pole_id: Option<i64>,
    #[serde(default)]
    pub end_pole_id: Option<i64>,
    #[serde(default)]
    pub conductor_type: Option<String>,
    #[serde(default)]
    pub voltage_rating_kv: Option<f64>,
    pub geom: String,
}

impl EntityPayload for ConductorPayload {
    const KIND: EntityKind = EntityKind::Conductor;

    fn geom(&self) -> &str {
        &self.geom
    }

    fn values(&self) -> Vec<BindValue> {
        vec![
            self.start_pole_id.into(),
            self.end_pole_id.into(),
            self.conductor_type.clone().into(),
            self.voltage_rating_kv.into(),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SwitchPayload {
    #[serde(default)]
    pub conductor_id: Option<i64>,
    #[serde(default)]
    pub switch_type: Option<String>,
    #[serde(default = "default_closed")]
    pub operational_status: Option<String>,
    pub geom: String,
}

impl EntityPayload for SwitchPayload {
    const KIND: EntityKind = EntityKind::Switch;

    fn geom(&self) -> &str {
        &self.geom
    }

    fn values(&self) -> Vec<BindValue> {
        vec![
            self.conductor_id.into(),
            self.switch_type.clone().into(),
            or_default(&self.operational_status, default_closed),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FusePayload {
    #[serde(default)]
    pub conductor_id: Option<i64>,
    #[serde(default)]
    pub fuse_rating_amps: Option<i64>,
    #[serde(default = "default_operational")]
    pub operational_status: Option<String>,
    pub geom: String,
}

impl EntityPayload for FusePayload {
    const KIND: EntityKind = EntityKind::Fuse;

    fn geom(&self) -> &str {
        &self.geom
    }

    fn values(&self) -> Vec<BindValue> {
        vec![
            self.conductor_id.into(),
            self.fuse_rating_amps.into(),
            or_default(&self.operational_status, default_operational),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_distinct_table_and_id() {
        let mut tables: Vec<_> = EntityKind::ALL.iter().map(|k| k.table()).collect();
        tables.sort();
        tables.dedup();
        assert_eq!(tables.len(), 7);

        for kind in EntityKind::ALL {
            assert!(kind.id_column().ends_with("_id"));
            assert!(!kind.columns().contains(&kind.id_column()));
        }
    }

    #[test]
    fn substation_defaults_status() {
        let payload: SubstationPayload = serde_json::from_str(
            r#"{"substation_name":"Central","voltage_level_kv":115.0,"geom":"POINT(-71.06 42.35)"}"#,
        )
        .unwrap();
        assert_eq!(payload.status.as_deref(), Some("Active"));

        let explicit_null: SubstationPayload = serde_json::from_str(
            r#"{"substation_name":"Central","voltage_level_kv":115.0,"status":null,"geom":"POINT(0 0)"}"#,
        )
        .unwrap();
        assert_eq!(explicit_null.status, None);
        assert_eq!(
            explicit_null.values()[2],
            BindValue::Text(Some("Active".to_string()))
        );
    }

    #[test]
    fn values_align_with_columns() {
        let pole: PolePayload =
            serde_json::from_str(r#"{"material_type":"Wood","height_meters":10.5,"geom":"POINT(1 2)"}"#)
                .unwrap();
        let values = pole.values();
        assert_eq!(values.len(), EntityKind::Pole.columns().len());
        assert_eq!(values[0], BindValue::Int(None));
        assert_eq!(values[1], BindValue::Text(Some("Wood".to_string())));
        assert_eq!(values[2], BindValue::Float(Some(10.5)));
        assert_eq!(values[3], BindValue::Int(None));
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let result: Result<FeederPayload, _> =
            serde_json::from_str(r#"{"feeder_name":"F12","geom":"LINESTRING(0 0, 1 1)"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn geometry_kinds() {
        assert_eq!(EntityKind::Feeder.geometry(), GeometryKind::LineString);
        assert_eq!(EntityKind::Conductor.geometry(), GeometryKind::LineString);
        assert_eq!(EntityKind::Fuse.geometry(), GeometryKind::Point);
        assert_eq!(SwitchPayload::KIND, EntityKind::Switch);
    }
}
