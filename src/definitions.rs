use ratatui::layout::Rect;

/// 聊天畫面中接收鍵盤輸入的區域。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatFocus {
    #[default]
    Composer,
    Transcript,
}

impl ChatFocus {
    pub fn label(&self) -> &'static str {
        match self {
            ChatFocus::Composer => "Message",
            ChatFocus::Transcript => "History",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            ChatFocus::Composer => ChatFocus::Transcript,
            ChatFocus::Transcript => ChatFocus::Composer,
        }
    }
}

/// 側邊選單的項目。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawerItem {
    ChangeAgent,
    QuickAsk,
    About,
}

impl DrawerItem {
    pub const ALL: [DrawerItem; 3] = [
        DrawerItem::ChangeAgent,
        DrawerItem::QuickAsk,
        DrawerItem::About,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            DrawerItem::ChangeAgent => "Change Agent",
            DrawerItem::QuickAsk => "Quick Ask",
            DrawerItem::About => "About",
        }
    }
}

/// 單次提問視窗中的輸入欄位。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuickAskField {
    #[default]
    ApiKey,
    Prompt,
}

impl QuickAskField {
    pub fn next(self) -> Self {
        match self {
            QuickAskField::ApiKey => QuickAskField::Prompt,
            QuickAskField::Prompt => QuickAskField::ApiKey,
        }
    }
}

/// 上一次繪製時記錄下來的可點擊區域，供滑鼠事件判斷位置。
#[derive(Debug, Clone, Default)]
pub struct HitAreas {
    /// 選擇畫面上每張人設卡片的位置，索引對應人設清單。
    pub agent_cards: Vec<Rect>,
    /// 聊天標題列上的選單按鈕。
    pub menu_button: Rect,
    /// 聊天標題列上的返回按鈕。
    pub back_button: Rect,
    /// 對話紀錄區域。
    pub transcript: Rect,
    /// 輸入框。
    pub composer: Rect,
    /// 開啟中的側邊選單。
    pub drawer: Option<Rect>,
    /// 側邊選單的每個項目。
    pub drawer_items: Vec<(DrawerItem, Rect)>,
}

impl HitAreas {
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// 判斷座標是否落在區域內。
pub fn contains(area: Rect, column: u16, row: u16) -> bool {
    column >= area.x
        && column < area.x.saturating_add(area.width)
        && row >= area.y
        && row < area.y.saturating_add(area.height)
}
