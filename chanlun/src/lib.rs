pub mod bar;
pub mod config;
pub mod constant;
pub mod engine;
pub mod events;
pub mod export;
pub mod fractal;
pub mod indicator;
pub mod level;
pub mod logging;
pub mod merger;
pub mod pivot;
pub mod point;
pub mod receiver;
pub mod signal;
pub mod stroke;

pub use bar::{Bar, Fractal, MergedBar};
pub use config::{EngineConfig, LevelConfig, MacdConfig, StrokeConfig};
pub use constant::{
	DataError, Direction, EventType, FractalPower, ListChange, Mark, StructureError,
};
pub use engine::{
	BarOutcome, BarUpdate, Engine, EngineSnapshot, LevelAnalysis, RejectReason,
};
pub use events::{EventPayload, Observable, Subscriber};
pub use export::{LevelReport, StructureReport, write_parquet_snapshot};
pub use fractal::FractalDetector;
pub use indicator::{EmaIndicator, MacdIndicator, MacdPoint};
pub use level::{Level, LevelChain, LevelUpdate};
pub use logging::init_logging;
pub use merger::{BarMerger, MergeOutcome};
pub use pivot::{Breakout, Pivot, PivotBuilder, PivotMember};
pub use point::{LevelPoint, Point, StructurePoint};
pub use receiver::{BarSource, CsvBarSource, DataReceiver, IngestStats};
pub use signal::{Extension, Jing, Leg, LegPattern, Signal, ThirdPoint, Zone};
pub use stroke::StrokeBuilder;
