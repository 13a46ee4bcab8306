use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Behavioural signature matched by the sandbox
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Signature {
    /// Signature name, the key into the rating table
    pub name: String,

    /// Malware families the signature points to
    #[serde(default, deserialize_with = "null_as_default")]
    pub families: Vec<String>,

    /// Free-text description
    #[serde(default)]
    pub description: Option<String>,

    /// Severity assigned by the sandbox
    #[serde(default, deserialize_with = "null_as_default")]
    pub severity: i64,

    /// Whether the signature is flagged as an alert
    #[serde(default, deserialize_with = "null_as_default")]
    pub alert: bool,

    /// External references
    #[serde(default, deserialize_with = "null_as_default")]
    pub references: Vec<String>,

    /// Per-occurrence data records
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: Vec<Value>,
}

impl Signature {
    /// Process id of every occurrence, `None` for occurrences not tied to a process
    pub fn occurrences(&self) -> impl Iterator<Item = Option<u64>> + '_ {
        self.data.iter().map(process_id)
    }
}

/// Read an explicit `null` as the field's default
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn process_id(record: &Value) -> Option<u64> {
    let pid = record.get("process_id")?;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pid.as_u64()
        .or_else(|| pid.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
}
