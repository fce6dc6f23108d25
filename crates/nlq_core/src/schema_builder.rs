use std::collections::HashMap;

use crate::schema::{DocumentIndexInfo, RelationalForeignKeyInfo};

/// Groups foreign-key rows (one row per FK column, as information-schema
/// queries return them) by constraint name into `RelationalForeignKeyInfo`.
///
/// The relational shape in is one row per column rather than one struct
/// per multi-column FK, so this builder is mostly a pass-through — kept for
/// symmetry with the document-index builder below and because multi-column
/// composite FKs still need their constraint name deduplicated.
#[derive(Default)]
pub struct ForeignKeyBuilder {
    rows: Vec<RelationalForeignKeyInfo>,
    seen: HashMap<(String, String), usize>,
}

impl ForeignKeyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_column(
        &mut self,
        column: String,
        ref_table: String,
        ref_column: String,
        constraint_name: String,
    ) {
        let key = (constraint_name.clone(), column.clone());
        if self.seen.contains_key(&key) {
            return;
        }
        self.seen.insert(key, self.rows.len());
        self.rows.push(RelationalForeignKeyInfo {
                column,
                ref_table,
                ref_column,
                constraint_name,
        });
    }

    pub fn build(self) -> Vec<RelationalForeignKeyInfo> {
        self.rows
    }

    pub fn build_sorted(mut self) -> Vec<RelationalForeignKeyInfo> {
        self.rows.sort_by(|a, b| a.column.cmp(&b.column));
        self.rows
    }
}

/// Groups index rows (one row per field, as Mongo's `listIndexes` returns
/// them) by index name into `DocumentIndexInfo`.
#[derive(Default)]
pub struct DocumentIndexBuilder {
    map: HashMap<String, DocumentIndexInfo>,
    order: Vec<String>,
}

impl DocumentIndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_field(&mut self, name: String, field: String, unique: bool) {
        if !self.map.contains_key(&name) {
            self.order.push(name.clone());
        }
        let entry = self.map.entry(name.clone()).or_insert_with(|| DocumentIndexInfo {
                name,
                fields: Vec::new(),
                unique,
        });
        if !entry.fields.contains(&field) {
            entry.fields.push(field);
        }
    }

    pub fn build(self) -> Vec<DocumentIndexInfo> {
        let DocumentIndexBuilder { mut map, order } = self;
        order
        .into_iter()
        .filter_map(|name| map.remove(&name))
        .collect()
    }

    pub fn build_sorted(self) -> Vec<DocumentIndexInfo> {
        let mut indexes = self.build();
        indexes.sort_by(|a, b| a.name.cmp(&b.name));
        indexes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fk_builder_dedupes_repeated_rows() {
        let mut builder = ForeignKeyBuilder::new();
        builder.add_column(
            "customer_id".into(),
            "customers".into(),
            "id".into(),
            "fk_order_customer".into(),
        );
        builder.add_column(
            "customer_id".into(),
            "customers".into(),
            "id".into(),
            "fk_order_customer".into(),
        );
        assert_eq!(builder.build().len(), 1);
    }

    #[test]
    fn document_index_builder_groups_fields_in_order() {
        let mut builder = DocumentIndexBuilder::new();
        builder.add_field("idx_name_email".into(), "name".into(), false);
        builder.add_field("idx_name_email".into(), "email".into(), false);
        builder.add_field("_id_".into(), "_id".into(), true);

        let indexes = builder.build();
        assert_eq!(indexes[0].name, "idx_name_email");
        assert_eq!(indexes[0].fields, vec!["name", "email"]);
        assert_eq!(indexes[1].name, "_id_");
    }
}
