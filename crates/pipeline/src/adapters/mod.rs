//! 呼び出し元ごとの入力を `ChangeRecord` の列に変換するアダプター
//!
//! どのアダプターも変換後は同じ `BatchCoordinator` に渡す。

pub mod direct;
pub mod gateway;
pub mod stream;

/// メトリクスの EntryPoint ディメンション
pub const STREAM_ENTRY_POINT: &str = "stream";
pub const GATEWAY_ENTRY_POINT: &str = "gateway";
pub const DIRECT_ENTRY_POINT: &str = "direct";
