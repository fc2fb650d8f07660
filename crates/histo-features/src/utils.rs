//! Shared dtype and column helpers.

use polars::prelude::*;

use crate::error::{FeatureError, Result};

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Category of a data type for validation purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DtypeCategory {
    /// Integer or floating point numbers
    Numeric,
    /// Boolean type
    Boolean,
    /// String, categorical or enum
    Text,
    /// Lists, structs, binary, temporal and anything else
    Other,
}

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Get the category of a DataType.
pub fn get_dtype_category(dtype: &DataType) -> DtypeCategory {
    if is_numeric_dtype(dtype) {
        DtypeCategory::Numeric
    } else if matches!(dtype, DataType::Boolean) {
        DtypeCategory::Boolean
    } else if matches!(
        dtype,
        DataType::String | DataType::Categorical(..) | DataType::Enum(..)
    ) {
        DtypeCategory::Text
    } else {
        DtypeCategory::Other
    }
}

/// Whether values of this dtype can be turned into categorical label levels.
#[inline]
pub fn is_label_dtype(dtype: &DataType) -> bool {
    !matches!(get_dtype_category(dtype), DtypeCategory::Other)
}

// =============================================================================
// Column Extraction
// =============================================================================

/// Read a numeric column as `f64` values, rejecting nulls, NaN and infinities.
///
/// `name` is only used for error messages.
pub fn finite_f64_values(column: &Column, name: &str) -> Result<Vec<f64>> {
    if column.null_count() > 0 {
        return Err(FeatureError::MalformedFeatureData(format!(
            "column '{}' contains {} missing value(s)",
            name,
            column.null_count()
        )));
    }

    let float_column = column.cast(&DataType::Float64)?;
    let values = float_column.f64()?;

    let mut out = Vec::with_capacity(values.len());
    for (row, value) in values.into_iter().enumerate() {
        match value {
            Some(v) if v.is_nan() => {
                return Err(FeatureError::MalformedFeatureData(format!(
                    "column '{}' has a missing (NaN) value at row {}",
                    name, row
                )));
            }
            Some(v) if v.is_infinite() => {
                return Err(FeatureError::MalformedFeatureData(format!(
                    "column '{}' has an infinite value at row {}",
                    name, row
                )));
            }
            Some(v) => out.push(v),
            None => {
                return Err(FeatureError::MalformedFeatureData(format!(
                    "column '{}' has a missing value at row {}",
                    name, row
                )));
            }
        }
    }

    Ok(out)
}

/// Read a label column as strings, rejecting nulls and unsupported dtypes.
pub fn label_strings(column: &Column) -> Result<Vec<String>> {
    let dtype = column.dtype();
    if !is_label_dtype(dtype) {
        return Err(FeatureError::MalformedLabelData(format!(
            "labels of type {} cannot be used as categories",
            dtype
        )));
    }
    if column.null_count() > 0 {
        return Err(FeatureError::MalformedLabelData(format!(
            "labels contain {} missing value(s)",
            column.null_count()
        )));
    }

    let string_column = column.cast(&DataType::String)?;
    let values = string_column.str()?;

    values
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            value.map(str::to_string).ok_or_else(|| {
                FeatureError::MalformedLabelData(format!("label at row {} is missing", row))
            })
        })
        .collect()
}
