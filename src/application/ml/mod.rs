pub mod attention;
#[cfg(feature = "onnx")]
pub mod onnx_encoder;
pub mod recurrent;
pub mod scaler;
pub mod sequence_model;
pub mod windower;

pub use attention::{AttentionOutput, AttentionWeights, attend};
pub use recurrent::{Activation, Dense, EncoderLayer, LstmCell, MergeMode, RecurrentEncoder};
pub use scaler::ScalerState;
pub use sequence_model::{OutputHead, SequenceModel};
pub use windower::latest_window;
