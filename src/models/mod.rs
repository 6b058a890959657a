// Domain models: instances, series, aggregated stats, report rows.

mod instance;
mod report;
mod series;
mod stats;

pub use instance::{
    Instance, MetricKind, Node, Product, SeriesKind, Topology, extract_database_name,
    normalize_role,
};
pub use report::{NodeRow, ProjectReport, ReportRow, RowStatus};
pub use series::{MetricSeries, Point, Window};
pub use stats::{
    AggregatedStat, AggregatedStats, CommandCategory, CommandStat, CommandStats, Reduction,
};
