use std::sync::Arc;

use async_stream::try_stream;

use crate::binding::BindingSet;
use crate::codec::Codecs;
use crate::engine::GeneratedColumns;
use crate::error::SqlBridgeError;
use crate::lob::sink::materialise_binding;
use crate::result::{ResultStream, RowStream, SqlResult, UpdateResult};
use crate::row::RowMetadata;
use crate::value::{HostType, HostValue};
use crate::worker::{ExecuteOutcome, WorkerHandle};

/// One SQL command, possibly compound, with its parameter bindings.
///
/// Positions are zero-based; the `?N`/`$N` placeholder surface is one-based
/// and resolved by [`Statement::bind_named`]. Calling [`Statement::add`]
/// closes the current binding and starts the next one, so a statement can
/// run several times with different parameters in one round.
#[derive(Debug)]
pub struct Statement {
    handle: Arc<WorkerHandle>,
    codecs: Arc<Codecs>,
    sql: String,
    bindings: BindingSet,
    generated: GeneratedColumns,
}

impl Statement {
    pub(crate) fn new(handle: Arc<WorkerHandle>, codecs: Arc<Codecs>, sql: impl Into<String>) -> Self {
        Self {
            handle,
            codecs,
            sql: sql.into(),
            bindings: BindingSet::default(),
            generated: GeneratedColumns::None,
        }
    }

    /// Binds `value` at the zero-based `position`, replacing any earlier
    /// value there.
    ///
    /// # Errors
    ///
    /// `BindingError` for a null value (use [`Statement::bind_null`]),
    /// `NoCodecFound`/`ConversionError` when the value cannot be encoded.
    pub fn bind<V>(&mut self, position: usize, value: V) -> Result<&mut Self, SqlBridgeError>
    where
        V: Into<HostValue>,
    {
        let value = value.into();
        if matches!(value, HostValue::Null) {
            return Err(SqlBridgeError::BindingError(format!(
                "cannot bind a null at position {position}; use bind_null with the intended type"
            )));
        }
        let encoded = self.codecs.encode(value)?;
        self.bindings.current_mut().set(position, encoded);
        Ok(self)
    }

    /// Binds by placeholder name, `?N` or `$N` with a one-based ordinal.
    ///
    /// # Errors
    ///
    /// `BindingError` when `name` does not match the placeholder pattern;
    /// otherwise as [`Statement::bind`].
    pub fn bind_named<V>(&mut self, name: &str, value: V) -> Result<&mut Self, SqlBridgeError>
    where
        V: Into<HostValue>,
    {
        let position = parse_placeholder(name)?;
        self.bind(position, value)
    }

    /// Binds a typed null at the zero-based `position`.
    ///
    /// # Errors
    ///
    /// `NoCodecFound` when no codec covers `host_type`.
    pub fn bind_null(
        &mut self,
        position: usize,
        host_type: HostType,
    ) -> Result<&mut Self, SqlBridgeError> {
        let encoded = self.codecs.encode_null(host_type)?;
        self.bindings.current_mut().set(position, encoded);
        Ok(self)
    }

    /// Binds a typed null by placeholder name.
    ///
    /// # Errors
    ///
    /// As [`Statement::bind_named`] and [`Statement::bind_null`].
    pub fn bind_null_named(
        &mut self,
        name: &str,
        host_type: HostType,
    ) -> Result<&mut Self, SqlBridgeError> {
        let position = parse_placeholder(name)?;
        self.bind_null(position, host_type)
    }

    /// Closes the current binding and starts a fresh one. With nothing bound
    /// since the last call this does nothing, so a trailing `add()` is safe.
    pub fn add(&mut self) -> &mut Self {
        self.bindings.finish_current();
        self
    }

    /// Asks updates to report every generated column.
    pub fn return_generated_values(&mut self) -> &mut Self {
        self.generated = GeneratedColumns::All;
        self
    }

    /// Asks updates to report exactly the named generated columns, in the
    /// given order. An empty list means every column.
    pub fn return_generated_columns<I, S>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = columns.into_iter().map(Into::into).collect();
        self.generated = if names.is_empty() {
            GeneratedColumns::All
        } else {
            GeneratedColumns::Named(names)
        };
        self
    }

    /// Runs the command: each sub-statement in order, each against every
    /// binding in order. Results arrive lazily as the stream is polled; the
    /// first failure ends the stream and nothing after it executes.
    ///
    /// Pending large-object parameters are uploaded to the engine the first
    /// time their binding runs.
    #[must_use]
    pub fn execute(self) -> ResultStream {
        let Self {
            handle,
            codecs,
            sql,
            bindings,
            generated,
        } = self;
        let statements = split_statements(&sql);
        let mut bindings = bindings.into_bindings();
        let stream = try_stream! {
            // Bindings before this index already had their large objects
            // uploaded; a binding's stream can only be drained once.
            let mut uploaded = 0;
            for statement in &statements {
                for (index, binding) in bindings.iter_mut().enumerate() {
                    if index >= uploaded {
                        materialise_binding(handle.as_ref(), binding).await?;
                        uploaded = index + 1;
                    }
                    let outcome = handle
                        .execute(statement.clone(), binding.clone(), generated.clone())
                        .await?;
                    match outcome {
                        ExecuteOutcome::Query { cursor_id, columns } => {
                            let metadata =
                                Arc::new(RowMetadata::from_descriptors(columns, &codecs));
                            yield SqlResult::Query(RowStream::new(
                                Arc::clone(&handle),
                                Arc::clone(&codecs),
                                metadata,
                                cursor_id,
                            ));
                        }
                        ExecuteOutcome::Update(update) => {
                            yield SqlResult::Update(UpdateResult::from_outcome(update, &codecs));
                        }
                    }
                }
            }
        };
        ResultStream::new(Box::pin(stream))
    }
}

/// Resolves a `?N`/`$N` placeholder to its zero-based position.
fn parse_placeholder(name: &str) -> Result<usize, SqlBridgeError> {
    let malformed = || {
        SqlBridgeError::BindingError(format!(
            "identifier '{name}' does not name a parameter; expected '?' or '$' followed by a 1-based ordinal, like ?1"
        ))
    };
    let digits = name.strip_prefix(['?', '$']).ok_or_else(malformed)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }
    let ordinal: usize = digits.parse().map_err(|_| malformed())?;
    if ordinal == 0 {
        return Err(malformed());
    }
    Ok(ordinal - 1)
}

/// Splits a compound command on `;`, trimming each piece and skipping empty
/// ones. Splitting is purely textual, so a `;` inside a quoted literal also
/// separates.
fn split_statements(sql: &str) -> Vec<String> {
    sql.split(';')
        .map(str::trim)
        .filter(|statement| !statement.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{parse_placeholder, split_statements};

    #[test]
    fn placeholders_resolve_to_zero_based_positions() {
        assert_eq!(parse_placeholder("?1").ok(), Some(0));
        assert_eq!(parse_placeholder("$3").ok(), Some(2));
        assert_eq!(parse_placeholder("?12").ok(), Some(11));
    }

    #[test]
    fn malformed_placeholders_name_the_expected_pattern() {
        for bad in ["name", "?", "$", "?0", "?+3", "? 1", "1", "?1x"] {
            let err = parse_placeholder(bad).unwrap_err();
            assert!(
                err.to_string().contains("1-based ordinal"),
                "{bad}: {err}"
            );
        }
    }

    #[test]
    fn compound_commands_split_in_order() {
        assert_eq!(
            split_statements("SELECT 1; SELECT 2"),
            vec!["SELECT 1", "SELECT 2"]
        );
        assert_eq!(
            split_statements("INSERT INTO t VALUES (?1);\n  UPDATE t SET x = ?1;"),
            vec!["INSERT INTO t VALUES (?1)", "UPDATE t SET x = ?1"]
        );
    }

    #[test]
    fn empty_pieces_are_dropped() {
        assert_eq!(split_statements(";;  ;"), Vec::<String>::new());
        assert_eq!(split_statements("  SELECT 1  "), vec!["SELECT 1"]);
    }
}
