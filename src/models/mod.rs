// Model backends — everything that turns a batch of text into rewritten text.
//
// `registry` resolves "<provider>/<model-path>" identifiers to concrete
// backends; `traits::TextModel` is the one contract they all satisfy.

pub mod batch;
pub mod download;
pub mod google;
pub mod onnx;
pub mod openai;
pub mod registry;
pub mod response;
pub mod traits;
pub mod yandex;
