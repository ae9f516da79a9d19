//! Composite index declarations, aggregation, and DDL generation.
//!
//! Fields declare index membership through [`IndexDecl`]; the
//! [`IndexBuilder`] aggregates all declarations of one table into named
//! [`IndexSpec`]s, validating that no two columns claim the same order
//! position, that no column is listed twice in the same index, and that a
//! name is not used for both a unique and a non-unique index.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Conflicts detected while aggregating per-field index declarations.
///
/// All of these surface at converter construction time, before any DDL
/// runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexDefinitionError {
    /// The same column is listed more than once under one index name.
    #[error("column '{column}' appears more than once in index '{index}'")]
    DuplicateColumn {
        /// The repeated column.
        column: String,
        /// The index name.
        index: String,
    },

    /// Two columns of one index declare the same order position.
    #[error("columns '{first}' and '{second}' cannot share order {order} in index '{index}'")]
    DuplicateOrder {
        /// One of the conflicting columns.
        first: String,
        /// The other conflicting column.
        second: String,
        /// The contested position.
        order: u32,
        /// The index name.
        index: String,
    },

    /// One name denotes both a unique and a non-unique index.
    #[error("there are both unique and non-unique indexes named '{0}'")]
    UniqueNameClash(String),
}

/// One membership of a field in a named composite index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMembership {
    /// Index name shared by all member columns.
    pub name: String,
    /// Position of this column within the index.
    pub order: u32,
    /// Sort direction of this column.
    pub ascending: bool,
}

/// Per-field index declaration.
///
/// A field may join any number of named composite indexes, each with an
/// explicit position and direction. A declaration without memberships asks
/// for an implicit single-column index, auto-named `{table}_{column}`,
/// ascending, and unique only when [`unique`](IndexDecl::unique) was used.
///
/// # Examples
///
/// ```
/// use rowmap_core::IndexDecl;
///
/// // implicit ascending index named `{table}_{column}`
/// let simple = IndexDecl::simple();
/// assert!(!simple.is_unique());
///
/// // second column of composite index "by_author", descending
/// let composite = IndexDecl::new().in_index_desc("by_author", 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct IndexDecl {
    unique: bool,
    memberships: Vec<IndexMembership>,
    unique_memberships: Vec<IndexMembership>,
}

impl IndexDecl {
    /// Starts an empty declaration; chain `in_index*` calls onto it.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares an implicit single-column ascending index.
    pub fn simple() -> Self {
        Self::default()
    }

    /// Declares an implicit single-column unique ascending index.
    pub fn unique() -> Self {
        Self { unique: true, ..Self::default() }
    }

    /// Joins the named index at `order`, ascending.
    pub fn in_index(mut self, name: impl Into<String>, order: u32) -> Self {
        self.memberships.push(IndexMembership {
            name: name.into(),
            order,
            ascending: true,
        });
        self
    }

    /// Joins the named index at `order`, descending.
    pub fn in_index_desc(mut self, name: impl Into<String>, order: u32) -> Self {
        self.memberships.push(IndexMembership {
            name: name.into(),
            order,
            ascending: false,
        });
        self
    }

    /// Joins the named unique index at `order`, ascending.
    pub fn in_unique(mut self, name: impl Into<String>, order: u32) -> Self {
        self.unique_memberships.push(IndexMembership {
            name: name.into(),
            order,
            ascending: true,
        });
        self
    }

    /// Joins the named unique index at `order`, descending.
    pub fn in_unique_desc(mut self, name: impl Into<String>, order: u32) -> Self {
        self.unique_memberships.push(IndexMembership {
            name: name.into(),
            order,
            ascending: false,
        });
        self
    }

    /// Whether the implicit index would be unique.
    pub fn is_unique(&self) -> bool {
        self.unique
    }

    /// Explicit non-unique memberships.
    pub fn memberships(&self) -> &[IndexMembership] {
        &self.memberships
    }

    /// Explicit unique memberships.
    pub fn unique_memberships(&self) -> &[IndexMembership] {
        &self.unique_memberships
    }
}

/// One column of a finished index definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexColumn {
    /// Column name.
    pub name: String,
    /// Sort direction.
    pub ascending: bool,
}

/// A finished, validated composite index definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Whether this is a unique index.
    pub unique: bool,
    /// Index name.
    pub name: String,
    /// Member columns in index order.
    pub columns: Vec<IndexColumn>,
}

impl IndexSpec {
    /// Renders the CREATE INDEX statement for this definition on `table`.
    ///
    /// The output is deterministic:
    /// `create [unique] index [if not exists] <name> on <table> ('col' ASC, ...)`.
    pub fn creation_sql(&self, table: &str, include_if_not_exists: bool) -> String {
        let mut sql = String::from("create ");
        if self.unique {
            sql.push_str("unique ");
        }
        sql.push_str("index ");
        if include_if_not_exists {
            sql.push_str("if not exists ");
        }
        sql.push_str(&self.name);
        sql.push_str(" on ");
        sql.push_str(table);
        sql.push_str(" (");
        for (i, column) in self.columns.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push('\'');
            sql.push_str(&column.name);
            sql.push_str("' ");
            sql.push_str(if column.ascending { "ASC" } else { "DESC" });
        }
        sql.push(')');
        sql
    }
}

#[derive(Debug, Clone)]
struct MemberColumn {
    column: String,
    ascending: bool,
    order: u32,
}

/// Aggregates per-field [`IndexDecl`]s of one table into [`IndexSpec`]s.
#[derive(Debug, Default)]
pub struct IndexBuilder {
    groups: HashMap<String, Vec<MemberColumn>>,
    unique_groups: HashMap<String, Vec<MemberColumn>>,
}

impl IndexBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the index memberships of one column.
    ///
    /// A declaration with no explicit memberships yields an implicit
    /// single-column index named `{table}_{column}`.
    pub fn add_column(
        &mut self,
        table: &str,
        column: &str,
        decl: &IndexDecl,
    ) -> Result<(), IndexDefinitionError> {
        let mut added = false;
        for membership in decl.memberships() {
            Self::add_member(&mut self.groups, column, membership)?;
            added = true;
        }
        for membership in decl.unique_memberships() {
            Self::add_member(&mut self.unique_groups, column, membership)?;
            added = true;
        }
        if !added {
            let implicit = IndexMembership {
                name: format!("{table}_{column}"),
                order: 0,
                ascending: true,
            };
            let groups = if decl.is_unique() {
                &mut self.unique_groups
            } else {
                &mut self.groups
            };
            Self::add_member(groups, column, &implicit)?;
        }
        Ok(())
    }

    fn add_member(
        groups: &mut HashMap<String, Vec<MemberColumn>>,
        column: &str,
        membership: &IndexMembership,
    ) -> Result<(), IndexDefinitionError> {
        let group = groups.entry(membership.name.clone()).or_default();
        if group.iter().any(|member| member.column == column) {
            return Err(IndexDefinitionError::DuplicateColumn {
                column: column.to_string(),
                index: membership.name.clone(),
            });
        }
        group.push(MemberColumn {
            column: column.to_string(),
            ascending: membership.ascending,
            order: membership.order,
        });
        Ok(())
    }

    /// Builds the final ordered index definitions.
    ///
    /// Non-unique indexes come first, each group sorted by the members'
    /// declared order; groups are emitted in name order so the output is
    /// deterministic.
    pub fn build(self) -> Result<Vec<IndexSpec>, IndexDefinitionError> {
        let mut specs = Vec::with_capacity(self.groups.len() + self.unique_groups.len());
        let mut seen: Vec<String> = Vec::new();

        let mut groups: Vec<_> = self.groups.into_iter().collect();
        groups.sort_by(|(a, _), (b, _)| a.cmp(b));
        for (name, members) in groups {
            seen.push(name.clone());
            specs.push(Self::finish_group(name, false, members)?);
        }

        let mut unique_groups: Vec<_> = self.unique_groups.into_iter().collect();
        unique_groups.sort_by(|(a, _), (b, _)| a.cmp(b));
        for (name, members) in unique_groups {
            if seen.contains(&name) {
                return Err(IndexDefinitionError::UniqueNameClash(name));
            }
            specs.push(Self::finish_group(name, true, members)?);
        }
        Ok(specs)
    }

    /// Builds the definitions as a name → spec lookup.
    pub fn build_map(self) -> Result<HashMap<String, IndexSpec>, IndexDefinitionError> {
        Ok(self
            .build()?
            .into_iter()
            .map(|spec| (spec.name.clone(), spec))
            .collect())
    }

    fn finish_group(
        name: String,
        unique: bool,
        mut members: Vec<MemberColumn>,
    ) -> Result<IndexSpec, IndexDefinitionError> {
        members.sort_by_key(|member| member.order);
        for pair in members.windows(2) {
            if pair[0].order == pair[1].order {
                return Err(IndexDefinitionError::DuplicateOrder {
                    first: pair[0].column.clone(),
                    second: pair[1].column.clone(),
                    order: pair[0].order,
                    index: name,
                });
            }
        }
        let columns = members
            .into_iter()
            .map(|member| IndexColumn {
                name: member.column,
                ascending: member.ascending,
            })
            .collect();
        Ok(IndexSpec { unique, name, columns })
    }
}
