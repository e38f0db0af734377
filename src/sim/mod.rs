// Paper trading: synthetic price stream and an in-memory broker
pub mod candle_buffer;
pub mod paper;
pub mod synthetic;

pub use candle_buffer::CandleBuffer;
pub use paper::{ClosedTrade, PaperBroker, PaperConfig};
pub use synthetic::{MarketScenario, SyntheticCandleGenerator};
