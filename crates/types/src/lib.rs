pub mod ids;
pub mod row;
pub mod source;

pub use ids::{BindingId, PlanId};
pub use row::{Column, RowTuple};
pub use source::{SourceHandle, SourceKind, normalize_source_text};
