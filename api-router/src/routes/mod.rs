pub mod export;
pub mod files;
pub mod liveness;
pub mod readiness;
pub mod search;
pub mod semesters;
pub mod stats;
pub mod subjects;
pub mod years;
