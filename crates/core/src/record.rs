use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// One purchased item as extracted by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub item: String,
    pub amount: f64,
}

/// The receipt total: a bare float, or the literal `"N/A"` when the model
/// could not read it off the receipt.
#[derive(Debug, Clone, PartialEq)]
pub enum TotalAmount {
    Amount(f64),
    NotAvailable,
}

impl Serialize for TotalAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TotalAmount::Amount(v) => serializer.serialize_f64(*v),
            TotalAmount::NotAvailable => serializer.serialize_str("N/A"),
        }
    }
}

impl<'de> Deserialize<'de> for TotalAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Num(f64),
            Text(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Num(v) => Ok(TotalAmount::Amount(v)),
            Raw::Text(s) if s == "N/A" => Ok(TotalAmount::NotAvailable),
            Raw::Text(s) => Err(D::Error::custom(format!(
                "Total_Amount must be a number or \"N/A\", got \"{s}\""
            ))),
        }
    }
}

/// The structured output of a full extraction run.
///
/// Field names on the wire match the schema the prompt asks the model for:
/// `Date` / `Description` / `Total_Amount`. `date` stays a plain string
/// (`YYYY-MM-DD` or `"N/A"`) — the record is persisted verbatim, not
/// re-interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptRecord {
    #[serde(rename = "Date")]
    pub date: String,
    /// Purchased items only — subtotal/tax/total lines are excluded by the
    /// extraction rules.
    #[serde(rename = "Description")]
    pub description: Vec<LineItem>,
    #[serde(rename = "Total_Amount")]
    pub total_amount: TotalAmount,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ReceiptRecord {
        ReceiptRecord {
            date: "2024-01-15".into(),
            description: vec![
                LineItem { item: "Coffee".into(), amount: 4.5 },
                LineItem { item: "Sandwich".into(), amount: 8.99 },
            ],
            total_amount: TotalAmount::Amount(13.49),
        }
    }

    #[test]
    fn serializes_with_schema_field_names() {
        let json = serde_json::to_value(sample()).unwrap();
        assert!(json.get("Date").is_some());
        assert!(json.get("Description").is_some());
        assert!(json.get("Total_Amount").is_some());
        assert_eq!(json["Total_Amount"], 13.49);
    }

    #[test]
    fn total_not_available_serializes_as_literal() {
        let record = ReceiptRecord { total_amount: TotalAmount::NotAvailable, ..sample() };
        let json = serde_json::to_value(record).unwrap();
        assert_eq!(json["Total_Amount"], "N/A");
    }

    #[test]
    fn round_trip_deep_equals() {
        let pretty = serde_json::to_string_pretty(&sample()).unwrap();
        let back: ReceiptRecord = serde_json::from_str(&pretty).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn total_rejects_arbitrary_string() {
        let err = serde_json::from_str::<TotalAmount>("\"13.49\"").unwrap_err();
        assert!(err.to_string().contains("N/A"));
    }

    #[test]
    fn missing_field_fails_deserialization() {
        let json = r#"{"Date": "2024-01-15", "Description": []}"#;
        assert!(serde_json::from_str::<ReceiptRecord>(json).is_err());
    }

    #[test]
    fn wrong_typed_description_fails() {
        let json = r#"{"Date": "N/A", "Description": "Coffee", "Total_Amount": 1.0}"#;
        assert!(serde_json::from_str::<ReceiptRecord>(json).is_err());
    }
}
