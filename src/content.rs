//! 内置题库与界面文案

use std::str::FromStr;

use serde::Serialize;

use crate::quiz::{QuestionPool, QuizItem};

const NUMBER_WORDS: [(&str, &str); 10] = [
    ("1", "ONE"),
    ("2", "TWO"),
    ("3", "THREE"),
    ("4", "FOUR"),
    ("5", "FIVE"),
    ("6", "SIX"),
    ("7", "SEVEN"),
    ("8", "EIGHT"),
    ("9", "NINE"),
    ("10", "TEN"),
];

const CHINESE_NUMERALS: [(&str, &str); 10] = [
    ("1", "一"),
    ("2", "二"),
    ("3", "三"),
    ("4", "四"),
    ("5", "五"),
    ("6", "六"),
    ("7", "七"),
    ("8", "八"),
    ("9", "九"),
    ("10", "十"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolKind {
    NumberWords,
    ChineseNumerals,
}

impl FromStr for PoolKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "number_words" | "numbers" => Ok(Self::NumberWords),
            "chinese_numerals" | "chinese" => Ok(Self::ChineseNumerals),
            other => Err(format!("unknown quiz pool: {other}")),
        }
    }
}

impl PoolKind {
    pub fn pool(self) -> QuestionPool {
        match self {
            Self::NumberWords => number_words(),
            Self::ChineseNumerals => chinese_numerals(),
        }
    }
}

fn builtin(pairs: &[(&str, &str)]) -> QuestionPool {
    let items = pairs
        .iter()
        .map(|(prompt, answer)| QuizItem::new(*prompt, *answer))
        .collect();
    QuestionPool::builtin(items)
}

/// 数字 → 英文单词
pub fn number_words() -> QuestionPool {
    builtin(&NUMBER_WORDS)
}

/// 数字 → 中文数字
pub fn chinese_numerals() -> QuestionPool {
    builtin(&CHINESE_NUMERALS)
}

/// 界面文案语言
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum UiLanguage {
    #[default]
    TraditionalChinese,
    English,
}

impl FromStr for UiLanguage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zh-hant" | "zh-tw" | "zh" | "traditional_chinese" => Ok(Self::TraditionalChinese),
            "en" | "english" => Ok(Self::English),
            other => Err(format!("unknown ui language: {other}")),
        }
    }
}

/// 界面文案，由渲染层显示
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UiText {
    pub instruction: &'static str,
    pub score_label: &'static str,
    pub correct: &'static str,
    pub incorrect: &'static str,
    pub restart_hint: &'static str,
}

impl UiText {
    pub fn for_language(language: UiLanguage) -> Self {
        match language {
            UiLanguage::TraditionalChinese => Self::traditional_chinese(),
            UiLanguage::English => Self::english(),
        }
    }

    pub fn traditional_chinese() -> Self {
        Self {
            instruction: "請伸出食指，觸碰正確的答案",
            score_label: "分數",
            correct: "答對了！",
            incorrect: "再試一次",
            restart_hint: "按 R 重新開始，按 S 拍照",
        }
    }

    pub fn english() -> Self {
        Self {
            instruction: "Point your index finger at the right answer",
            score_label: "Score",
            correct: "Correct!",
            incorrect: "Try again",
            restart_hint: "Press R to restart, S to capture",
        }
    }
}
