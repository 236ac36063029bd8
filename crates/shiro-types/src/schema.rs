//! Schema state: tables, columns, indexes and foreign keys.
//!
//! Modeled as an arena of tables addressed by index rather than a
//! pointer-rich graph (see `DESIGN.md`, "Cyclic references for schema ↔
//! state ↔ generator"). Columns and foreign keys reference their owning /
//! target table by index into `SchemaState::tables`, so the whole schema is
//! plain data that can be cloned, diffed and handed to a generator without
//! lifetime gymnastics.

use serde::{Deserialize, Serialize};

// ============================================================================
// Column types
// ============================================================================

/// The category of a column's domain, used to check foreign-key and
/// predicate compatibility without caring about the exact SQL type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnCategory {
    Numeric,
    StringLike,
    Temporal,
    Boolean,
}

/// A concrete SQL column type, grouped by [`ColumnCategory`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    TinyInt,
    Int,
    BigInt,
    Decimal { precision: u8, scale: u8 },
    Double,
    Varchar { max_len: u32 },
    Text,
    Date,
    DateTime,
    Timestamp,
    Boolean,
}

impl ColumnType {
    pub fn category(&self) -> ColumnCategory {
        match self {
            ColumnType::TinyInt
            | ColumnType::Int
            | ColumnType::BigInt
            | ColumnType::Decimal { .. }
            | ColumnType::Double => ColumnCategory::Numeric,
            ColumnType::Varchar { .. } | ColumnType::Text => ColumnCategory::StringLike,
            ColumnType::Date | ColumnType::DateTime | ColumnType::Timestamp => {
                ColumnCategory::Temporal
            }
            ColumnType::Boolean => ColumnCategory::Boolean,
        }
    }

    /// Whether two column types are compatible targets for a foreign key
    /// (same category; exact width/precision is allowed to differ).
    pub fn fk_compatible(&self, other: &ColumnType) -> bool {
        self.category() == other.category()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub ty: ColumnType,
    pub nullable: bool,
}

// ============================================================================
// Indexes and foreign keys
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Index {
    pub name: String,
    pub columns: Vec<usize>,
    pub unique: bool,
}

/// A foreign key from a column of the owning table to a column of another
/// table, addressed by index into [`SchemaState::tables`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKey {
    pub name: String,
    pub child_column: usize,
    pub parent_table: usize,
    pub parent_column: usize,
}

// ============================================================================
// Tables
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableKind {
    Base,
    View,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    pub indexes: Vec<Index>,
    pub foreign_keys: Vec<ForeignKey>,
    pub has_primary_key: bool,
    pub row_count: u64,
    pub kind: TableKind,
}

impl Table {
    pub fn new_base(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
            has_primary_key: false,
            row_count: 0,
            kind: TableKind::Base,
        }
    }

    pub fn is_view(&self) -> bool {
        self.kind == TableKind::View
    }

    /// Records `n` freshly inserted rows. The row counter only ever
    /// increases: it is a monotonic estimate of "rows ever inserted", not a
    /// live COUNT(*), so DELETEs do not decrement it.
    pub fn record_inserts(&mut self, n: u64) {
        self.row_count = self.row_count.saturating_add(n);
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}

// ============================================================================
// Schema state (the arena)
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaState {
    pub database: String,
    tables: Vec<Table>,
}

/// Errors returned when mutating a [`SchemaState`] in a way that would
/// violate one of its invariants (unique names, foreign keys pointing at
/// existing compatible columns, views never taking DML).
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("table name '{0}' already exists")]
    DuplicateTableName(String),
    #[error("table index {0} out of range")]
    NoSuchTable(usize),
    #[error("column index {0} out of range for table '{1}'")]
    NoSuchColumn(usize, String),
    #[error("foreign key target table/column category mismatch")]
    IncompatibleForeignKey,
    #[error("views do not receive DML ('{0}')")]
    ViewsAreReadOnly(String),
}

impl SchemaState {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            tables: Vec::new(),
        }
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn table(&self, idx: usize) -> Option<&Table> {
        self.tables.get(idx)
    }

    pub fn table_mut(&mut self, idx: usize) -> Option<&mut Table> {
        self.tables.get_mut(idx)
    }

    pub fn find_table(&self, name: &str) -> Option<usize> {
        self.tables.iter().position(|t| t.name == name)
    }

    pub fn base_table_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.tables
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.is_view())
            .map(|(i, _)| i)
    }

    pub fn view_count(&self) -> usize {
        self.tables.iter().filter(|t| t.is_view()).count()
    }

    /// Inserts a new table, enforcing the unique-name invariant.
    pub fn add_table(&mut self, table: Table) -> Result<usize, SchemaError> {
        if self.find_table(&table.name).is_some() {
            return Err(SchemaError::DuplicateTableName(table.name));
        }
        self.tables.push(table);
        Ok(self.tables.len() - 1)
    }

    /// Adds a foreign key from `child_table`/`child_column` to
    /// `parent_table`/`parent_column`, validating that both endpoints
    /// exist and share a compatible column category.
    pub fn add_foreign_key(
        &mut self,
        child_table: usize,
        child_column: usize,
        parent_table: usize,
        parent_column: usize,
        name: impl Into<String>,
    ) -> Result<(), SchemaError> {
        let child_ty = self
            .tables
            .get(child_table)
            .ok_or(SchemaError::NoSuchTable(child_table))?
            .columns
            .get(child_column)
            .ok_or_else(|| {
                SchemaError::NoSuchColumn(child_column, self.tables[child_table].name.clone())
            })?
            .ty
            .clone();
        let parent = self
            .tables
            .get(parent_table)
            .ok_or(SchemaError::NoSuchTable(parent_table))?;
        if parent.is_view() {
            return Err(SchemaError::ViewsAreReadOnly(parent.name.clone()));
        }
        let parent_ty = parent
            .columns
            .get(parent_column)
            .ok_or_else(|| SchemaError::NoSuchColumn(parent_column, parent.name.clone()))?
            .ty
            .clone();
        if !child_ty.fk_compatible(&parent_ty) {
            return Err(SchemaError::IncompatibleForeignKey);
        }
        self.tables[child_table].foreign_keys.push(ForeignKey {
            name: name.into(),
            child_column,
            parent_table,
            parent_column,
        });
        Ok(())
    }

    /// Validates the two schema-level invariants from §3: unique table
    /// names, and every foreign key pointing at an existing table/column
    /// of a compatible category. Intended for tests and post-mutation
    /// sanity checks, not the hot path.
    pub fn check_invariants(&self) -> Result<(), SchemaError> {
        let mut seen = std::collections::HashSet::new();
        for t in &self.tables {
            if !seen.insert(t.name.as_str()) {
                return Err(SchemaError::DuplicateTableName(t.name.clone()));
            }
        }
        for t in &self.tables {
            for fk in &t.foreign_keys {
                let parent = self
                    .tables
                    .get(fk.parent_table)
                    .ok_or(SchemaError::NoSuchTable(fk.parent_table))?;
                let parent_col = parent
                    .columns
                    .get(fk.parent_column)
                    .ok_or_else(|| SchemaError::NoSuchColumn(fk.parent_column, parent.name.clone()))?;
                let child_col = &t.columns[fk.child_column];
                if !child_col.ty.fk_compatible(&parent_col.ty) {
                    return Err(SchemaError::IncompatibleForeignKey);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_col(name: &str) -> Column {
        Column {
            name: name.to_string(),
            ty: ColumnType::Int,
            nullable: false,
        }
    }

    #[test]
    fn duplicate_table_name_rejected() {
        let mut s = SchemaState::new("db");
        s.add_table(Table::new_base("t1")).unwrap();
        let err = s.add_table(Table::new_base("t1")).unwrap_err();
        assert_eq!(err, SchemaError::DuplicateTableName("t1".to_string()));
    }

    #[test]
    fn foreign_key_requires_compatible_category() {
        let mut s = SchemaState::new("db");
        let mut parent = Table::new_base("parent");
        parent.columns.push(int_col("id"));
        let parent_idx = s.add_table(parent).unwrap();

        let mut child = Table::new_base("child");
        child.columns.push(Column {
            name: "parent_id".to_string(),
            ty: ColumnType::Varchar { max_len: 10 },
            nullable: true,
        });
        let child_idx = s.add_table(child).unwrap();

        let err = s
            .add_foreign_key(child_idx, 0, parent_idx, 0, "fk_child_parent")
            .unwrap_err();
        assert_eq!(err, SchemaError::IncompatibleForeignKey);
    }

    #[test]
    fn foreign_key_accepts_compatible_category() {
        let mut s = SchemaState::new("db");
        let mut parent = Table::new_base("parent");
        parent.columns.push(int_col("id"));
        let parent_idx = s.add_table(parent).unwrap();

        let mut child = Table::new_base("child");
        child.columns.push(int_col("parent_id"));
        let child_idx = s.add_table(child).unwrap();

        s.add_foreign_key(child_idx, 0, parent_idx, 0, "fk_child_parent")
            .unwrap();
        s.check_invariants().unwrap();
    }

    #[test]
    fn row_counter_is_monotonic_not_a_live_count() {
        let mut t = Table::new_base("t");
        t.record_inserts(5);
        t.record_inserts(3);
        assert_eq!(t.row_count, 8);
    }

    #[test]
    fn views_cannot_be_fk_targets() {
        let mut s = SchemaState::new("db");
        let mut view = Table::new_base("v");
        view.kind = TableKind::View;
        view.columns.push(int_col("id"));
        let view_idx = s.add_table(view).unwrap();

        let mut child = Table::new_base("child");
        child.columns.push(int_col("v_id"));
        let child_idx = s.add_table(child).unwrap();

        let err = s
            .add_foreign_key(child_idx, 0, view_idx, 0, "fk_child_v")
            .unwrap_err();
        assert_eq!(err, SchemaError::ViewsAreReadOnly("v".to_string()));
    }
}
