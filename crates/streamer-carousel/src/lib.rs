//! MPEG-2 DSM-CC object carousel receiver: CRC-checked section dispatch,
//! BIOP gateway/module-info parsing, module block reassembly, and the PID
//! filter subscriptions an external demux attaches on the carousel's
//! behalf.

mod biop;
mod decompress;
mod dispatch;
mod error;
mod host;
mod module;
mod registry;
mod subscription;

pub use decompress::uncompress;
pub use dispatch::{CompletedModule, process_section};
pub use error::{DecompressError, Error, ModuleError};
pub use host::{CarouselHost, ObjectCacheSink, SectionFeed};
pub use module::{AddModuleOutcome, DdbHeader, DdbOutcome, DeclaredModule, ModuleRecord};
pub use registry::{Carousel, CarouselRegistry, Gateway, MAXCAROUSELS};
pub use subscription::{StreamRequest, StreamSubscription};
