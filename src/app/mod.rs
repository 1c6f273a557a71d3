//! `app` 模組是應用程式的核心。
//!
//! 它負責管理應用程式的整體狀態、處理使用者輸入（鍵盤、滑鼠），
//! 並在每個 tick 把背景請求的結果套用到畫面狀態。

// --- 子模組宣告 ---

/// `agent` 模組：選擇人設、送出訊息、側邊選單動作。
mod agent;
/// `init` 模組：負責 `App` 結構的初始化。
mod init;
/// `keyboard` 模組：專門處理所有的鍵盤輸入事件。
mod keyboard;
/// `mouse` 模組：專門處理所有的滑鼠輸入事件。
mod mouse;
/// `overlays` 模組：單次提問與關於視窗的按鍵處理。
mod overlays;
/// `quick_ask` 模組：單次提問視窗的狀態與背景請求。
mod quick_ask;
/// `state` 模組：定義了 `App` 結構以及所有核心的狀態類型。
mod state;
/// `tick` 模組：處理應用程式的定時更新事件（tick）。
mod tick;

// --- 公共 API 重新導出 ---
pub use quick_ask::QuickAskState;
pub use state::{AgentSelection, App, ChatView, Composer, DrawerState, OverlayState, Screen};
