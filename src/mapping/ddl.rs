//! Table definitions derived from application types.
//!
//! A struct-shaped type becomes one column per member; anything else becomes
//! a single `value` column. Non-nullable members are declared `NOT NULL`.

use eyre::Result;

use super::{Mapped, Shape, TypeMapper};
use crate::config::SCALAR_COLUMN_NAME;
use crate::types::{quote_identifier, StructuralType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub ty: StructuralType,
    pub nullable: bool,
}

pub fn table_columns<T: Mapped>() -> Result<Vec<ColumnDef>> {
    let mut mapper = TypeMapper::new();
    let shape = mapper.shape::<T>()?;
    let columns = match &*shape {
        Shape::Struct(fields) if !T::TRANSPARENT => fields
            .iter()
            .map(|f| ColumnDef {
                name: f.name.clone(),
                ty: f.ty.clone(),
                nullable: f.nullable,
            })
            .collect(),
        _ => vec![ColumnDef {
            name: SCALAR_COLUMN_NAME.to_string(),
            ty: shape.structural_type(),
            nullable: T::NULLABLE,
        }],
    };
    Ok(columns)
}

/// `CREATE TABLE` statement for a table holding rows of `T`.
pub fn create_table_sql<T: Mapped>(table: &str) -> Result<String> {
    let columns: Vec<String> = table_columns::<T>()?
        .iter()
        .map(|c| {
            let mut def = format!("{} {}", quote_identifier(&c.name), c.ty);
            if !c.nullable {
                def.push_str(" NOT NULL");
            }
            def
        })
        .collect();
    Ok(format!(
        "CREATE TABLE {} ({})",
        quote_identifier(table),
        columns.join(", ")
    ))
}
