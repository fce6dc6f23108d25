use nlq_core::SchemaPayload;

const PRICE_MARKERS: &[&str] = &["price", "amount", "cost", "total"];
const QUANTITY_MARKERS: &[&str] = &["quantity", "qty", "count", "stock"];
const DATE_MARKERS: &[&str] = &["date", "createdat", "timestamp", "at"];
const PRODUCT_REF_MARKERS: &[&str] = &["productid", "product_id", "sku"];
const ACTIVITY_MARKERS: &[&str] = &["userid", "user_id", "actorid", "sessionid"];

/// Emits a compact capabilities string from column/field name presence, used
/// only as planner context — never gates correctness.
pub fn capabilities_string(payload: &SchemaPayload) -> String {
    let names = field_names(payload);
    let has_any = |markers: &[&str]| names.iter().any(|n| markers.iter().any(|m| n.contains(m)));

    let mut caps = Vec::new();
    if has_any(PRICE_MARKERS) && has_any(PRODUCT_REF_MARKERS) {
        caps.push("top_selling_products");
    }
    if has_any(PRICE_MARKERS) && has_any(DATE_MARKERS) {
        caps.push("revenue_over_time");
    }
    if has_any(ACTIVITY_MARKERS) && has_any(DATE_MARKERS) {
        caps.push("activity_over_time");
    }
    if has_any(QUANTITY_MARKERS) {
        caps.push("quantity_tracking");
    }

    caps.join(",")
}

fn field_names(payload: &SchemaPayload) -> Vec<String> {
    match payload {
        SchemaPayload::Document { collections } => collections
        .iter()
        .flat_map(|c| c.fields.iter().map(|f| f.name.to_lowercase()))
        .collect(),
        SchemaPayload::Relational { tables } => tables
        .iter()
        .flat_map(|t| t.columns.iter().map(|c| c.name.to_lowercase()))
        .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nlq_core::{CollectionSchema, DocumentFieldInfo, InferredType};

    #[test]
    fn detects_top_selling_products_capability() {
        let payload = SchemaPayload::Document {
            collections: vec![CollectionSchema {
                    collection: "orders".into(),
                    fields: vec![
                        DocumentFieldInfo {
                            name: "price".into(),
                            inferred_type: InferredType::Number,
                            required: true,
                            unique: false,
                            r#enum: None,
                            reference: None,
                        },
                        DocumentFieldInfo {
                            name: "productId".into(),
                            inferred_type: InferredType::Identifier,
                            required: true,
                            unique: false,
                            r#enum: None,
                            reference: Some("product".into()),
                        },
                    ],
                    indexes: vec![],
                    relationships: vec![],
            }],
        };
        assert!(capabilities_string(&payload).contains("top_selling_products"));
    }
}
