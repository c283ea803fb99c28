//! Record store collaborator for ShiftCrew.
//!
//! Domain records (employees, schedules, demand) are plain JSON objects grouped
//! by table. The orchestrator and gateway only depend on the [`RecordStore`]
//! trait; [`MemoryRecordStore`] and [`FileRecordStore`] are the bundled backends.

/// Typed employee records and the demo roster.
pub mod roster;
/// Store trait, query criteria and backends.
pub mod store;

pub use roster::{demo_roster, Availability, Employee, EMPLOYEES_TABLE};
pub use store::{Criteria, FileRecordStore, MemoryRecordStore, Record, RecordStore};
