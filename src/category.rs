//! The four trash categories and their wire/display representations.
//!
//! The set is closed: model class indices, serial tokens and chute angles
//! are all positional lookups over these four variants. The model's trained
//! class order must match `from_class_index`; there is no runtime check.

use std::fmt;

/// One of the four sorting categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TrashCategory {
    Other,
    Kitchen,
    Recyclable,
    Hazardous,
}

impl TrashCategory {
    /// All categories in table/class-index order.
    pub const ALL: [TrashCategory; 4] = [
        TrashCategory::Other,
        TrashCategory::Kitchen,
        TrashCategory::Recyclable,
        TrashCategory::Hazardous,
    ];

    /// Chinese display name used on the status board.
    pub fn display_name(self) -> &'static str {
        match self {
            TrashCategory::Other => "其他垃圾",
            TrashCategory::Kitchen => "厨余垃圾",
            TrashCategory::Recyclable => "可回收垃圾",
            TrashCategory::Hazardous => "有害垃圾",
        }
    }

    /// Token sent to the microcontroller in `CLASS:<TOKEN>` commands.
    /// Case-sensitive.
    pub fn command_token(self) -> &'static str {
        match self {
            TrashCategory::Other => "QITA",
            TrashCategory::Kitchen => "CHUYU",
            TrashCategory::Recyclable => "KEHUISHOU",
            TrashCategory::Hazardous => "YOUHAI",
        }
    }

    /// Token the microcontroller uses in `FULL:`/`UNFULL:` signals.
    /// Case-sensitive.
    pub fn status_token(self) -> &'static str {
        match self {
            TrashCategory::Other => "OTHER",
            TrashCategory::Kitchen => "KITCHEN",
            TrashCategory::Recyclable => "RECYCLABLE",
            TrashCategory::Hazardous => "HAZARDOUS",
        }
    }

    pub fn from_status_token(token: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|category| category.status_token() == token)
    }

    /// Positional mapping from the model's class index.
    pub fn from_class_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Chute rotation for this category's bin, in degrees.
    pub fn rotation_angle(self) -> u16 {
        match self {
            TrashCategory::Other => 0,
            TrashCategory::Kitchen => 90,
            TrashCategory::Recyclable => 180,
            TrashCategory::Hazardous => 270,
        }
    }

    /// Index into per-category arrays (same order as `ALL`).
    pub fn index(self) -> usize {
        match self {
            TrashCategory::Other => 0,
            TrashCategory::Kitchen => 1,
            TrashCategory::Recyclable => 2,
            TrashCategory::Hazardous => 3,
        }
    }
}

impl fmt::Display for TrashCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_index_round_trips() {
        for (index, category) in TrashCategory::ALL.into_iter().enumerate() {
            assert_eq!(category.index(), index);
            assert_eq!(TrashCategory::from_class_index(index), Some(category));
        }
        assert_eq!(TrashCategory::from_class_index(4), None);
    }

    #[test]
    fn status_token_round_trips() {
        for category in TrashCategory::ALL {
            assert_eq!(
                TrashCategory::from_status_token(category.status_token()),
                Some(category)
            );
        }
        assert_eq!(TrashCategory::from_status_token("PAPER"), None);
    }

    #[test]
    fn status_tokens_are_case_sensitive() {
        assert_eq!(TrashCategory::from_status_token("kitchen"), None);
        assert_eq!(TrashCategory::from_status_token("Kitchen"), None);
    }

    #[test]
    fn kitchen_wiring() {
        assert_eq!(TrashCategory::Kitchen.command_token(), "CHUYU");
        assert_eq!(TrashCategory::Kitchen.rotation_angle(), 90);
        assert_eq!(TrashCategory::Kitchen.display_name(), "厨余垃圾");
    }

    #[test]
    fn angles_cover_the_full_turn() {
        let angles: Vec<u16> = TrashCategory::ALL
            .into_iter()
            .map(TrashCategory::rotation_angle)
            .collect();
        assert_eq!(angles, vec![0, 90, 180, 270]);
    }
}
