use ratatui::style::Color;

// --- 基底 ---
pub const BG_PRIMARY: Color = Color::Rgb(17, 24, 39);
pub const BG_PANEL: Color = Color::Rgb(31, 41, 55);
pub const FG_PRIMARY: Color = Color::Rgb(229, 231, 235);
pub const FG_DIM: Color = Color::Rgb(156, 163, 175);

// --- 上下列 ---
pub const BAR_BG: Color = Color::Rgb(30, 64, 175);
pub const BAR_TEXT: Color = Color::Rgb(239, 246, 255);
pub const BAR_HIGHLIGHT_BG: Color = Color::Rgb(59, 130, 246);

// --- 側邊選單與浮動視窗 ---
pub const MENU_BG: Color = Color::Rgb(55, 65, 81);
pub const MENU_BORDER: Color = Color::Rgb(209, 213, 219);
pub const MENU_TEXT: Color = Color::Rgb(243, 244, 246);
pub const MENU_HIGHLIGHT_BG: Color = Color::Rgb(219, 234, 254);
pub const MENU_HIGHLIGHT_TEXT: Color = Color::Rgb(30, 58, 138);

pub const BORDER_IDLE: Color = Color::Rgb(75, 85, 99);
pub const BORDER_FOCUS: Color = Color::Rgb(96, 165, 250);
pub const PANEL_HIGHLIGHT_BG: Color = Color::Rgb(147, 197, 253);

// --- 對話 ---
pub const USER_BUBBLE_BG: Color = Color::Rgb(37, 99, 235);
pub const USER_BUBBLE_FG: Color = Color::Rgb(255, 255, 255);
pub const ASSISTANT_LABEL: Color = Color::Rgb(120, 200, 160);
pub const ERROR_TEXT: Color = Color::Rgb(239, 68, 68);

// --- Markdown ---
pub const HEADING: Color = Color::Rgb(130, 170, 255);
pub const LINK: Color = Color::Rgb(100, 180, 255);
pub const INLINE_CODE_FG: Color = Color::Rgb(230, 190, 120);
pub const INLINE_CODE_BG: Color = Color::Rgb(40, 40, 40);
pub const CODE_BLOCK_FG: Color = Color::Rgb(200, 200, 200);
pub const CODE_GUTTER: Color = Color::Rgb(70, 70, 70);
pub const QUOTE_BAR: Color = Color::Rgb(100, 100, 100);
