use std::time::Duration;

pub const QUESTION_COUNT: i32 = 8;
pub const COUNTDOWN_START: u32 = 3;

pub const READY_BANNER: &str = "Ready";
pub const SET_BANNER: &str = "Set";
pub const GO_BANNER: &str = "Go!";
pub const OUTRO_BANNER: &str =
    "Thanks for playing!\n\nSubscribe & Follow\nfor more awesome quizzes!";

const DIFFICULTY_LABELS: [&str; 4] = ["Simple", "Medium", "Expert", "Genius"];

/// Difficulty tier for a question slot. Valid for indices 0..=7.
pub fn difficulty_label(question_index: usize) -> &'static str {
    DIFFICULTY_LABELS[question_index / 2]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Ready,
    Set,
    Go,
    Question,
    Answer,
    Outro,
}

impl Phase {
    /// Delay before the next scheduled tick once this phase is entered.
    /// `None` means scheduling halts (nothing is pending in `Idle`, and
    /// `Outro` stays on screen until an explicit restart).
    pub fn tick_delay(self) -> Option<Duration> {
        match self {
            Phase::Idle | Phase::Outro => None,
            Phase::Ready | Phase::Set | Phase::Go | Phase::Question => {
                Some(Duration::from_millis(1000))
            }
            Phase::Answer => Some(Duration::from_millis(2000)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentationState {
    pub phase: Phase,
    /// -1 outside the question cycle, 0..=7 during it.
    pub question_index: i32,
    /// Seconds left on the question timer; meaningful only in `Question`.
    pub countdown: u32,
    /// True exactly while the answer card is shown.
    pub revealed: bool,
    /// Non-empty only during Ready/Set/Go/Outro.
    pub banner_text: &'static str,
}

impl Default for PresentationState {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            question_index: -1,
            countdown: 0,
            revealed: false,
            banner_text: "",
        }
    }
}

impl PresentationState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Applies exactly one transition. Total over `Phase`: every reachable
    /// state has a defined successor, so advancing can never fail.
    pub fn advance(&mut self) {
        match self.phase {
            Phase::Idle => {
                self.phase = Phase::Ready;
                self.banner_text = READY_BANNER;
            }
            Phase::Ready => {
                self.phase = Phase::Set;
                self.banner_text = SET_BANNER;
            }
            Phase::Set => {
                self.phase = Phase::Go;
                self.banner_text = GO_BANNER;
            }
            Phase::Go => {
                self.phase = Phase::Question;
                self.question_index = 0;
                self.countdown = COUNTDOWN_START;
                self.banner_text = "";
            }
            Phase::Question => {
                if self.countdown > 1 {
                    self.countdown -= 1;
                } else {
                    self.phase = Phase::Answer;
                    self.revealed = true;
                }
            }
            Phase::Answer => {
                if self.question_index < QUESTION_COUNT - 1 {
                    self.phase = Phase::Question;
                    self.question_index += 1;
                    self.revealed = false;
                    self.countdown = COUNTDOWN_START;
                } else {
                    self.phase = Phase::Outro;
                    self.banner_text = OUTRO_BANNER;
                }
            }
            // Self-loop; the scheduler has already halted by this point.
            Phase::Outro => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_run_visits_phases_in_order() {
        let mut state = PresentationState::default();
        let mut visited = Vec::new();

        state.advance();
        while state.phase != Phase::Outro {
            visited.push((state.phase, state.question_index));
            state.advance();
        }
        visited.push((state.phase, state.question_index));

        assert_eq!(visited[0], (Phase::Ready, -1));
        assert_eq!(visited[1], (Phase::Set, -1));
        assert_eq!(visited[2], (Phase::Go, -1));

        // Each question runs the countdown 3, 2, 1 then reveals once.
        let mut cursor = 3;
        for expected_index in 0..QUESTION_COUNT {
            for _ in 0..COUNTDOWN_START {
                assert_eq!(visited[cursor].0, Phase::Question);
                assert_eq!(visited[cursor].1, expected_index);
                cursor += 1;
            }
            assert_eq!(visited[cursor], (Phase::Answer, expected_index));
            cursor += 1;
        }
        assert_eq!(visited[cursor], (Phase::Outro, 7));
        assert_eq!(cursor + 1, visited.len());
    }

    #[test]
    fn countdown_decrements_before_reveal() {
        let mut state = PresentationState::default();
        for _ in 0..4 {
            state.advance();
        }
        assert_eq!(state.phase, Phase::Question);
        assert_eq!(state.countdown, 3);

        state.advance();
        assert_eq!(state.countdown, 2);
        state.advance();
        assert_eq!(state.countdown, 1);
        assert!(!state.revealed);

        state.advance();
        assert_eq!(state.phase, Phase::Answer);
        assert!(state.revealed);
    }

    #[test]
    fn outro_is_a_self_loop() {
        let mut state = PresentationState::default();
        loop {
            state.advance();
            if state.phase == Phase::Outro {
                break;
            }
        }
        let frozen = state.clone();
        state.advance();
        assert_eq!(state, frozen);
        assert_eq!(state.banner_text, OUTRO_BANNER);
    }

    #[test]
    fn banner_and_question_index_never_both_active() {
        let mut state = PresentationState::default();
        state.advance();
        loop {
            if state.phase != Phase::Idle {
                let banner = !state.banner_text.is_empty() && state.question_index < 0;
                let question = state.banner_text.is_empty() && state.question_index >= 0;
                // Outro keeps the final question index alongside its banner.
                let outro = state.phase == Phase::Outro && !state.banner_text.is_empty();
                assert!(banner || question || outro, "bad state: {state:?}");
            }
            if state.phase == Phase::Outro {
                break;
            }
            state.advance();
        }
    }

    #[test]
    fn difficulty_labels_cover_all_question_slots() {
        assert_eq!(difficulty_label(0), "Simple");
        assert_eq!(difficulty_label(1), "Simple");
        assert_eq!(difficulty_label(2), "Medium");
        assert_eq!(difficulty_label(3), "Medium");
        assert_eq!(difficulty_label(4), "Expert");
        assert_eq!(difficulty_label(5), "Expert");
        assert_eq!(difficulty_label(6), "Genius");
        assert_eq!(difficulty_label(7), "Genius");
    }

    #[test]
    fn tick_delays_match_the_schedule() {
        assert_eq!(Phase::Ready.tick_delay(), Some(Duration::from_millis(1000)));
        assert_eq!(Phase::Set.tick_delay(), Some(Duration::from_millis(1000)));
        assert_eq!(Phase::Go.tick_delay(), Some(Duration::from_millis(1000)));
        assert_eq!(
            Phase::Question.tick_delay(),
            Some(Duration::from_millis(1000))
        );
        assert_eq!(
            Phase::Answer.tick_delay(),
            Some(Duration::from_millis(2000))
        );
        assert_eq!(Phase::Idle.tick_delay(), None);
        assert_eq!(Phase::Outro.tick_delay(), None);
    }
}
