//! Key naming and encoding table used by the resolver.
//!
//! Each logical field is looked up as `prefix + suffix` for every configured
//! prefix in order. Numeric fields additionally list the integer encodings to
//! try, since different writers persisted the same field as 64-bit or 32-bit.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

pub const CALORIES_PREFIXES: [&str; 3] = ["flutter.", "", "flutter.flutter."];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    Percentage,
    Consumed,
    Goal,
    LastUpdated,
}

impl Field {
    pub fn is_numeric(&self) -> bool {
        !matches!(self, Field::LastUpdated)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Percentage => "percentage",
            Field::Consumed => "consumed",
            Field::Goal => "goal",
            Field::LastUpdated => "lastUpdated",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NumericDecode {
    Int64,
    Int32,
}

/// How the percentage reaches the widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResolutionVariant {
    /// The producer persists a percentage next to consumed/goal.
    #[default]
    Precomputed,
    /// Only consumed/goal are persisted; the percentage is computed from them.
    Derived,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    pub field: Field,
    pub suffix: String,
    #[serde(default)]
    pub decode_order: Vec<NumericDecode>,
}

impl FieldSpec {
    pub fn numeric(field: Field, suffix: &str, decode_order: &[NumericDecode]) -> Self {
        Self {
            field,
            suffix: suffix.to_string(),
            decode_order: decode_order.to_vec(),
        }
    }

    pub fn text(field: Field, suffix: &str) -> Self {
        Self {
            field,
            suffix: suffix.to_string(),
            decode_order: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionPolicy {
    #[serde(default)]
    pub variant: ResolutionVariant,
    pub prefixes: Vec<String>,
    pub fields: Vec<FieldSpec>,
}

impl ResolutionPolicy {
    /// Keys written by the app's preferences plugin. Depending on the plugin
    /// version the keys carry one, zero or two `flutter.` prefixes; the single
    /// prefix is the current spelling and wins.
    pub fn calories() -> Self {
        const DECODE: [NumericDecode; 2] = [NumericDecode::Int64, NumericDecode::Int32];
        Self {
            variant: ResolutionVariant::Precomputed,
            prefixes: CALORIES_PREFIXES.iter().map(|p| p.to_string()).collect(),
            fields: vec![
                FieldSpec::numeric(Field::Percentage, "appWidgetCaloriesPercent", &DECODE),
                FieldSpec::numeric(Field::Consumed, "appWidgetCaloriesConsumed", &DECODE),
                FieldSpec::numeric(Field::Goal, "appWidgetCaloriesGoal", &DECODE),
                FieldSpec::text(Field::LastUpdated, "appWidgetLastUpdated"),
            ],
        }
    }

    /// Keys of the dedicated nutrition widget store. It persists plain ints and
    /// no percentage.
    pub fn nutrition() -> Self {
        const DECODE: [NumericDecode; 2] = [NumericDecode::Int32, NumericDecode::Int64];
        Self {
            variant: ResolutionVariant::Derived,
            prefixes: vec![String::new()],
            fields: vec![
                FieldSpec::numeric(Field::Consumed, "nutrition_calories", &DECODE),
                FieldSpec::numeric(Field::Goal, "nutrition_calories_goal", &DECODE),
                FieldSpec::text(Field::LastUpdated, "nutrition_last_updated"),
            ],
        }
    }

    pub fn spec(&self, field: Field) -> Option<&FieldSpec> {
        self.fields.iter().find(|spec| spec.field == field)
    }

    /// Every store key this policy may look at, in lookup order.
    pub fn candidate_keys(&self) -> Vec<String> {
        self.prefixes
            .iter()
            .flat_map(|prefix| {
                self.fields
                    .iter()
                    .map(move |spec| format!("{prefix}{}", spec.suffix))
            })
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.prefixes.is_empty() {
            bail!("resolution policy needs at least one prefix (use \"\" for bare keys)");
        }

        for (index, spec) in self.fields.iter().enumerate() {
            if spec.suffix.is_empty() {
                bail!("field {} has an empty key suffix", spec.field.as_str());
            }
            if self.fields[..index].iter().any(|other| other.field == spec.field) {
                bail!("field {} is listed twice", spec.field.as_str());
            }
            match (spec.field.is_numeric(), spec.decode_order.is_empty()) {
                (true, true) => bail!(
                    "numeric field {} needs at least one decode strategy",
                    spec.field.as_str()
                ),
                (false, false) => bail!(
                    "text field {} cannot have numeric decode strategies",
                    spec.field.as_str()
                ),
                _ => {}
            }
        }

        if self.variant == ResolutionVariant::Derived && self.spec(Field::Percentage).is_some() {
            bail!("derived policies compute the percentage and must not look it up");
        }

        Ok(())
    }
}

impl Default for ResolutionPolicy {
    fn default() -> Self {
        Self::calories()
    }
}
