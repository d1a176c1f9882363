// Multi-language support module
// Localized UI strings for English and Chinese

#[derive(Clone)]
pub struct Assets {
    // Menu items
    pub menu_help: &'static str,
    pub menu_new: &'static str,
    pub menu_level: &'static str,
    pub menu_options: &'static str,
    pub menu_exit: &'static str,

    // Level names
    pub level_easy: &'static str,
    pub level_normal: &'static str,
    pub level_hard: &'static str,

    // Level dialog
    pub start_title: &'static str,
    pub start_header: &'static str,
    pub start_prompt: &'static str,

    // Options modal
    pub opt_animations: &'static str,
    pub opt_ascii_icons: &'static str,
    pub opt_language: &'static str,

    // Help modal
    pub help_controls: &'static str,
    pub help_move: &'static str,
    pub help_open: &'static str,
    pub help_flag: &'static str,
    pub help_levels: &'static str,

    // Win/Loss modals
    pub loss_title: &'static str,
    pub loss_header: &'static str,
    pub loss_message: &'static str,
    pub win_title: &'static str,
    pub win_message: &'static str,
    pub win_time_fmt: &'static str, // "Time: {} seconds"

    // Status bar
    pub status_fmt: &'static str, // " Mines: {}   Time: {} seconds "

    // Buttons
    pub btn_ok: &'static str,
    pub btn_close: &'static str,

    // Terminal size messages
    pub tsmsg_line1: &'static str,
    pub tsmsg_line2: &'static str, // "Minimum size required: {} x {}"
    pub tsmsg_title: &'static str,

    // Language names for selection
    pub lang_english: &'static str,
    pub lang_chinese: &'static str,
}

/// Returns English language assets
pub fn english_assets() -> Assets {
    Assets {
        menu_help: "Help",
        menu_new: "New",
        menu_level: "Level",
        menu_options: "Options",
        menu_exit: "Exit",

        level_easy: "Easy",
        level_normal: "Normal",
        level_hard: "Hard",

        start_title: "Start",
        start_header: "Easy, normal or hard?",
        start_prompt: "Choose your level:",

        opt_animations: "Animations",
        opt_ascii_icons: "ASCII icons",
        opt_language: "Language",

        help_controls: " Controls:",
        help_move: "  Mouse | Arrows        - move cursor",
        help_open: "  L-Click | Space/Enter - open",
        help_flag: "  R-Click | F           - toggle flag",
        help_levels: "  Normal spins numbers, Hard resets tiles",

        loss_title: "Game over",
        loss_header: "Look, you lose!",
        loss_message: "But you can try again!",
        win_title: "Success",
        win_message: "Field cleared, you win!",
        win_time_fmt: "Time: {} seconds",

        status_fmt: " Mines: {}   Time: {} seconds ",

        btn_ok: " OK ",
        btn_close: " CLOSE ",

        tsmsg_line1: "Terminal layout too small",
        tsmsg_line2: "Minimum size required: {} x {}",
        tsmsg_title: "Resize needed",

        lang_english: "English",
        lang_chinese: "中文",
    }
}

/// Returns Chinese language assets
pub fn chinese_assets() -> Assets {
    Assets {
        menu_help: "帮助",
        menu_new: "新游戏",
        menu_level: "难度",
        menu_options: "选项",
        menu_exit: "退出",

        level_easy: "简单",
        level_normal: "普通",
        level_hard: "困难",

        start_title: "开始",
        start_header: "简单、普通还是困难？",
        start_prompt: "请选择难度：",

        opt_animations: "动画效果",
        opt_ascii_icons: "ASCII图标",
        opt_language: "语言",

        help_controls: " 操作说明：",
        help_move: "  鼠标 | 方向键        - 移动光标",
        help_open: "  左键 | 空格/回车     - 翻开",
        help_flag: "  右键 | F             - 标记/取消",
        help_levels: "  普通难度数字旋转，困难难度格子会复位",

        loss_title: "游戏结束",
        loss_header: "你踩到地雷了！",
        loss_message: "再试一次吧！",
        win_title: "成功",
        win_message: "地雷已清除，你赢了！",
        win_time_fmt: "用时：{} 秒",

        status_fmt: " 地雷：{}   时间：{} 秒 ",

        btn_ok: " 确定 ",
        btn_close: " 关闭 ",

        tsmsg_line1: "终端屏幕布局过小",
        tsmsg_line2: "最小需要尺寸：{} x {}",
        tsmsg_title: "需要调整大小",

        lang_english: "English",
        lang_chinese: "中文",
    }
}

/// Normalize a language code ("zh-CN" → "zh"), defaulting to English
fn normalize(lang_code: &str) -> &'static str {
    if lang_code.to_lowercase().starts_with("zh") {
        "zh"
    } else {
        "en"
    }
}

/// Holds the current language code and active string assets
pub struct Lang {
    pub current_lang: String,
    pub assets: Assets,
}

impl Lang {
    pub fn new(lang_code: &str) -> Self {
        let code = normalize(lang_code);
        Lang {
            current_lang: code.to_string(),
            assets: if code == "zh" { chinese_assets() } else { english_assets() },
        }
    }

    /// Switches the current language and reloads all string assets
    pub fn switch_to(&mut self, lang_code: &str) {
        *self = Lang::new(lang_code);
    }

    /// The other supported language, used by the options toggle
    pub fn next_code(&self) -> &'static str {
        if self.current_lang == "zh" { "en" } else { "zh" }
    }

    pub fn language_name(&self) -> &'static str {
        if self.current_lang == "zh" {
            self.assets.lang_chinese
        } else {
            self.assets.lang_english
        }
    }

    /// Localized level name by index (0=Easy, 1=Normal, 2=Hard)
    pub fn level_name(&self, index: usize) -> &'static str {
        match index {
            0 => self.assets.level_easy,
            1 => self.assets.level_normal,
            _ => self.assets.level_hard,
        }
    }
}

/// Substitute `{}` placeholders in order
pub fn fill(fmt: &str, args: &[&dyn std::fmt::Display]) -> String {
    let mut out = String::with_capacity(fmt.len() + 8);
    let mut rest = fmt;
    let mut args = args.iter();
    while let Some(pos) = rest.find("{}") {
        out.push_str(&rest[..pos]);
        match args.next() {
            Some(a) => out.push_str(&a.to_string()),
            None => out.push_str("{}"),
        }
        rest = &rest[pos + 2..];
    }
    out.push_str(rest);
    out
}
