use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }
    };
}

string_id!(ReviewId);
string_id!(FileId);
string_id!(ColumnId);

/// Identity of one grid cell: a (document, extraction column) pair.
///
/// The sole map key into the cell state store; stable for the lifetime of a
/// review.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellKey {
    pub file_id: FileId,
    pub column_id: ColumnId,
}

impl CellKey {
    pub fn new(file_id: FileId, column_id: ColumnId) -> Self {
        Self { file_id, column_id }
    }
}
