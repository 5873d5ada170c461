use std::collections::HashMap;
use std::sync::Arc;

use crate::codec::{Codecs, Requested};
use crate::engine::ColumnDescriptor;
use crate::error::SqlBridgeError;
use crate::value::{EngineValue, HostDecode, HostType, HostValue, TypeTag};

/// One column of a result, enriched with the host type an untyped read of it
/// resolves to.
#[derive(Debug, Clone)]
pub struct ColumnMetadata {
    name: String,
    tag: TypeTag,
    host_type: Option<HostType>,
    nullable: Option<bool>,
    precision: Option<u64>,
    scale: Option<u32>,
}

impl ColumnMetadata {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn tag(&self) -> TypeTag {
        self.tag
    }

    /// The host type [`Row::value`] decodes this column into; `None` when no
    /// codec claims the tag.
    #[must_use]
    pub fn host_type(&self) -> Option<HostType> {
        self.host_type
    }

    /// `None` when the engine does not report nullability.
    #[must_use]
    pub fn nullable(&self) -> Option<bool> {
        self.nullable
    }

    #[must_use]
    pub fn precision(&self) -> Option<u64> {
        self.precision
    }

    #[must_use]
    pub fn scale(&self) -> Option<u32> {
        self.scale
    }
}

/// Column metadata for one result, computed once per execution and shared by
/// every row of it.
#[derive(Debug)]
pub struct RowMetadata {
    columns: Vec<ColumnMetadata>,
    by_name: HashMap<String, usize>,
}

impl RowMetadata {
    pub(crate) fn from_descriptors(descriptors: Vec<ColumnDescriptor>, codecs: &Codecs) -> Self {
        let columns: Vec<ColumnMetadata> = descriptors
            .into_iter()
            .map(|descriptor| ColumnMetadata {
                host_type: codecs.preferred_type(&descriptor.tag),
                name: descriptor.name,
                tag: descriptor.tag,
                nullable: descriptor.nullable,
                precision: descriptor.precision,
                scale: descriptor.scale,
            })
            .collect();
        let mut by_name = HashMap::with_capacity(columns.len());
        for (index, column) in columns.iter().enumerate() {
            by_name.entry(column.name.clone()).or_insert(index);
        }
        Self { columns, by_name }
    }

    #[must_use]
    pub fn columns(&self) -> &[ColumnMetadata] {
        &self.columns
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    #[must_use]
    pub fn column(&self, index: usize) -> Option<&ColumnMetadata> {
        self.columns.get(index)
    }

    /// Resolves a column name: exact match first, then the first
    /// case-insensitive hit. Duplicate names resolve to the first occurrence.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        if let Some(&index) = self.by_name.get(name) {
            return Some(index);
        }
        self.columns
            .iter()
            .position(|column| column.name.eq_ignore_ascii_case(name))
    }
}

/// One decoded-on-demand result row.
///
/// The row keeps the engine's values and converts per read, so requesting
/// the same column as two different host types works.
#[derive(Debug)]
pub struct Row {
    values: Vec<EngineValue>,
    metadata: Arc<RowMetadata>,
    codecs: Arc<Codecs>,
}

impl Row {
    pub(crate) fn new(
        values: Vec<EngineValue>,
        metadata: Arc<RowMetadata>,
        codecs: Arc<Codecs>,
    ) -> Self {
        Self {
            values,
            metadata,
            codecs,
        }
    }

    #[must_use]
    pub fn metadata(&self) -> &RowMetadata {
        &self.metadata
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Decodes a column into an explicit Rust type. NULL columns decode only
    /// into `Option` targets.
    ///
    /// # Errors
    ///
    /// `ConversionError` for unknown columns or NULL into a non-`Option`
    /// type; `NoCodecFound` when the column cannot convert to `T`.
    pub fn get<T: HostDecode>(&self, index: usize) -> Result<T, SqlBridgeError> {
        let (value, column) = self.entry(index)?;
        match self
            .codecs
            .decode(value, &column.tag(), Requested::Exact(T::HOST_TYPE))?
        {
            Some(decoded) => T::from_host(decoded),
            None => T::from_null(),
        }
    }

    /// [`Row::get`] by column name.
    ///
    /// # Errors
    ///
    /// As [`Row::get`], plus `ConversionError` when no column matches.
    pub fn get_named<T: HostDecode>(&self, name: &str) -> Result<T, SqlBridgeError> {
        self.get(self.index_for(name)?)
    }

    /// Decodes a column into its canonical host type.
    ///
    /// # Errors
    ///
    /// `ConversionError` for unknown columns; `NoCodecFound` when no codec
    /// claims the column's tag.
    pub fn value(&self, index: usize) -> Result<HostValue, SqlBridgeError> {
        let (value, column) = self.entry(index)?;
        Ok(self
            .codecs
            .decode(value, &column.tag(), Requested::Any)?
            .unwrap_or(HostValue::Null))
    }

    /// [`Row::value`] by column name.
    ///
    /// # Errors
    ///
    /// As [`Row::value`], plus `ConversionError` when no column matches.
    pub fn value_named(&self, name: &str) -> Result<HostValue, SqlBridgeError> {
        self.value(self.index_for(name)?)
    }

    fn entry(&self, index: usize) -> Result<(&EngineValue, &ColumnMetadata), SqlBridgeError> {
        match (self.values.get(index), self.metadata.column(index)) {
            (Some(value), Some(column)) => Ok((value, column)),
            _ => Err(SqlBridgeError::ConversionError(format!(
                "column index {index} out of range; row has {} columns",
                self.values.len()
            ))),
        }
    }

    fn index_for(&self, name: &str) -> Result<usize, SqlBridgeError> {
        self.metadata
            .index_of(name)
            .ok_or_else(|| SqlBridgeError::ConversionError(format!("no column named '{name}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::NullLobStore;

    fn metadata_with(names: &[&str]) -> RowMetadata {
        let codecs = Codecs::standard(Arc::new(NullLobStore));
        let descriptors = names
            .iter()
            .map(|name| ColumnDescriptor::new(*name, TypeTag::Integer))
            .collect();
        RowMetadata::from_descriptors(descriptors, &codecs)
    }

    fn row(values: Vec<EngineValue>, descriptors: Vec<ColumnDescriptor>) -> Row {
        let codecs = Arc::new(Codecs::standard(Arc::new(NullLobStore)));
        let metadata = Arc::new(RowMetadata::from_descriptors(descriptors, &codecs));
        Row::new(values, metadata, codecs)
    }

    #[test]
    fn exact_name_lookup_wins_over_case_folding() {
        let metadata = metadata_with(&["id", "ID"]);
        assert_eq!(metadata.index_of("id"), Some(0));
        assert_eq!(metadata.index_of("ID"), Some(1));
        assert_eq!(metadata.index_of("Id"), Some(0));
    }

    #[test]
    fn duplicate_names_resolve_to_the_first_occurrence() {
        let metadata = metadata_with(&["n", "n"]);
        assert_eq!(metadata.index_of("n"), Some(0));
        assert_eq!(metadata.index_of("N"), Some(0));
    }

    #[test]
    fn unknown_names_are_none() {
        let metadata = metadata_with(&["a"]);
        assert_eq!(metadata.index_of("b"), None);
    }

    #[test]
    fn typed_get_decodes_and_converts() {
        let row = row(
            vec![EngineValue::Integer(41), EngineValue::Text("x".into())],
            vec![
                ColumnDescriptor::new("n", TypeTag::Integer),
                ColumnDescriptor::new("s", TypeTag::Varchar),
            ],
        );
        assert_eq!(row.get::<i32>(0).unwrap(), 41);
        assert_eq!(row.get::<i64>(0).unwrap(), 41);
        assert_eq!(row.get_named::<String>("S").unwrap(), "x");
    }

    #[test]
    fn null_requires_an_option_target() {
        let row = row(
            vec![EngineValue::Null],
            vec![ColumnDescriptor::new("n", TypeTag::Integer)],
        );
        assert_eq!(row.get::<Option<i32>>(0).unwrap(), None);
        assert!(row.get::<i32>(0).is_err());
        assert_eq!(row.value(0).unwrap(), HostValue::Null);
    }

    #[test]
    fn untyped_read_uses_the_preferred_type() {
        let row = row(
            vec![EngineValue::Integer(7)],
            vec![ColumnDescriptor::new("n", TypeTag::Integer)],
        );
        assert_eq!(row.value(0).unwrap(), HostValue::I32(7));
        assert_eq!(
            row.metadata().column(0).unwrap().host_type(),
            Some(HostType::I32)
        );
    }

    #[test]
    fn out_of_range_reads_fail() {
        let row = row(
            vec![EngineValue::Integer(7)],
            vec![ColumnDescriptor::new("n", TypeTag::Integer)],
        );
        assert!(row.get::<i32>(3).is_err());
        assert!(row.get_named::<i32>("missing").is_err());
    }
}
