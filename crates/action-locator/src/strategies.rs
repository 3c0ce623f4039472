//! Candidate selection
//!
//! Pure functions over probe output. Every selector honours the same
//! rules: invisible candidates never win, and rows inside a modal dialog
//! never count as conversations.

use crate::labels::LabelTable;
use crate::types::{Candidate, InfoStrategy};

/// Icons whose top edge sits below this line are not header controls.
pub const TOP_BAND_PX: f64 = 120.0;

fn is_conversation(candidate: &Candidate) -> bool {
    let meta = &candidate.metadata;
    meta.visible && !meta.in_dialog && (meta.has_avatar || meta.has_time_marker)
}

/// First rendered row, in document order, that looks like a conversation.
pub fn select_top_row(rows: &[Candidate]) -> Option<&Candidate> {
    rows.iter().find(|row| is_conversation(row))
}

pub fn count_rows(rows: &[Candidate]) -> u32 {
    rows.iter().filter(|row| is_conversation(row)).count() as u32
}

/// Label order decides; for each label an exact match beats a substring one.
pub fn select_by_aria_label(candidates: &[Candidate]) -> Option<&Candidate> {
    let mut visible: Vec<&Candidate> = candidates.iter().filter(|c| c.metadata.visible).collect();
    visible.sort_by_key(|c| (c.metadata.label_index.unwrap_or(usize::MAX), !c.metadata.exact));
    visible.into_iter().next()
}

/// Last visible icon control inside the header.
pub fn select_header_icon(candidates: &[Candidate]) -> Option<&Candidate> {
    candidates.iter().rev().find(|c| c.metadata.visible)
}

/// Rightmost visible icon control inside the top band.
pub fn select_rightmost_in_band(candidates: &[Candidate], band_px: f64) -> Option<&Candidate> {
    let mut best: Option<&Candidate> = None;
    let mut max_right = 0.0;
    for candidate in candidates.iter().filter(|c| c.metadata.visible) {
        if candidate.metadata.top < band_px && candidate.metadata.right > max_right {
            max_right = candidate.metadata.right;
            best = Some(candidate);
        }
    }
    best
}

pub fn select_info(strategy: InfoStrategy, candidates: &[Candidate]) -> Option<&Candidate> {
    match strategy {
        InfoStrategy::AriaLabel => select_by_aria_label(candidates),
        InfoStrategy::HeaderIcon => select_header_icon(candidates),
        InfoStrategy::TopBandIcon => select_rightmost_in_band(candidates, TOP_BAND_PX),
    }
}

/// First visible control whose text is exactly one of the delete labels.
pub fn select_text_match<'a>(candidates: &'a [Candidate], labels: &LabelTable) -> Option<&'a Candidate> {
    candidates
        .iter()
        .find(|c| c.metadata.visible && labels.is_delete(&c.metadata.text))
}

/// First dialog button whose text is exactly one of the confirm labels.
pub fn select_confirm<'a>(candidates: &'a [Candidate], labels: &LabelTable) -> Option<&'a Candidate> {
    candidates
        .iter()
        .find(|c| c.metadata.in_dialog && labels.is_confirm(&c.metadata.text))
}

pub fn select_back(candidates: &[Candidate]) -> Option<&Candidate> {
    candidates.iter().find(|c| c.metadata.visible)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CandidateMetadata;

    fn row(token: &str, visible: bool, in_dialog: bool, avatar: bool, time: bool) -> Candidate {
        Candidate::new(
            token,
            CandidateMetadata {
                visible,
                in_dialog,
                has_avatar: avatar,
                has_time_marker: time,
                ..Default::default()
            },
        )
    }

    fn icon(token: &str, top: f64, right: f64) -> Candidate {
        Candidate::new(
            token,
            CandidateMetadata {
                visible: true,
                top,
                right,
                ..Default::default()
            },
        )
    }

    fn text(token: &str, text: &str, in_dialog: bool) -> Candidate {
        Candidate::new(
            token,
            CandidateMetadata {
                visible: true,
                in_dialog,
                text: text.to_string(),
                ..Default::default()
            },
        )
    }

    #[test]
    fn top_row_skips_dialogs_hidden_and_bare_rows() {
        let rows = vec![
            row("dialog", true, true, true, true),
            row("hidden", false, false, true, false),
            row("bare", true, false, false, false),
            row("time-only", true, false, false, true),
            row("avatar", true, false, true, false),
        ];
        assert_eq!(select_top_row(&rows).unwrap().token, "time-only");
        assert_eq!(count_rows(&rows), 2);
        assert!(select_top_row(&rows[..3]).is_none());
    }

    #[test]
    fn aria_label_prefers_label_order_then_exactness() {
        let mk = |token: &str, idx: usize, exact: bool, visible: bool| {
            Candidate::new(
                token,
                CandidateMetadata {
                    visible,
                    label_index: Some(idx),
                    exact,
                    ..Default::default()
                },
            )
        };
        let candidates = vec![
            mk("later", 4, true, true),
            mk("substring", 1, false, true),
            mk("hidden", 0, true, false),
            mk("exact", 1, true, true),
        ];
        assert_eq!(select_by_aria_label(&candidates).unwrap().token, "exact");
    }

    #[test]
    fn top_band_picks_rightmost_above_the_line() {
        let candidates = vec![
            icon("left", 10.0, 100.0),
            icon("right", 20.0, 420.0),
            icon("low", 300.0, 440.0),
        ];
        assert_eq!(
            select_rightmost_in_band(&candidates, TOP_BAND_PX).unwrap().token,
            "right"
        );
        assert!(select_rightmost_in_band(&[icon("low", 130.0, 10.0)], TOP_BAND_PX).is_none());
    }

    #[test]
    fn header_icon_takes_last_visible() {
        let mut hidden = icon("hidden", 0.0, 0.0);
        hidden.metadata.visible = false;
        let candidates = vec![icon("a", 0.0, 0.0), icon("b", 0.0, 0.0), hidden];
        assert_eq!(select_header_icon(&candidates).unwrap().token, "b");
    }

    #[test]
    fn text_matching_is_exact() {
        let labels = LabelTable::default();
        let candidates = vec![text("partial", "Delete chat now", false), text("hit", "Sohbeti sil", false)];
        assert_eq!(select_text_match(&candidates, &labels).unwrap().token, "hit");

        let dialog = vec![text("cancel", "Cancel", true), text("outside", "Delete", false), text("ok", "Delete", true)];
        assert_eq!(select_confirm(&dialog, &labels).unwrap().token, "ok");
    }
}
