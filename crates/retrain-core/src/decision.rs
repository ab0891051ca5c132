//! Yes/no checkpoints where a run may need an operator.
//!
//! The pipeline asks a [`DecisionPoint`] and never reads stdin itself, so the
//! same run can be driven interactively or fully unattended.

use crate::error::Result;
use crate::quality::QualityIssue;
use std::cell::RefCell;
use std::io::{BufRead, Write};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub enum Question {
    /// The dataset failed the quality gate; train on it anyway?
    ContinueDespiteQuality { issue: QualityIssue },
    /// The new artifact validated; promote it?
    ConfirmDeployment { artifact: PathBuf },
}

impl Question {
    pub fn prompt(&self) -> String {
        match self {
            Question::ContinueDespiteQuality { issue } => {
                format!("Data quality check failed ({issue}). Continue training anyway? (y/n): ")
            }
            Question::ConfirmDeployment { artifact } => {
                format!("Deploy the new model at {}? (y/n): ", artifact.display())
            }
        }
    }
}

pub trait DecisionPoint {
    fn decide(&self, question: &Question) -> Result<bool>;
}

/// Unattended answers: deployment is always approved, the quality gate
/// answers with the configured default.
#[derive(Debug, Clone, Copy)]
pub struct AutoDecider {
    pub continue_on_quality_failure: bool,
}

impl DecisionPoint for AutoDecider {
    fn decide(&self, question: &Question) -> Result<bool> {
        let answer = match question {
            Question::ContinueDespiteQuality { .. } => self.continue_on_quality_failure,
            Question::ConfirmDeployment { .. } => true,
        };
        tracing::info!(question = ?question, answer, "auto decision");
        Ok(answer)
    }
}

/// Asks an operator. `y`/`yes` (any case) approves; anything else,
/// including end of input, declines.
pub struct PromptDecider<R, W> {
    input: RefCell<R>,
    output: RefCell<W>,
}

impl<R: BufRead, W: Write> PromptDecider<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input: RefCell::new(input),
            output: RefCell::new(output),
        }
    }
}

impl PromptDecider<std::io::StdinLock<'static>, std::io::Stderr> {
    pub fn stdio() -> Self {
        Self::new(std::io::stdin().lock(), std::io::stderr())
    }
}

impl<R: BufRead, W: Write> DecisionPoint for PromptDecider<R, W> {
    fn decide(&self, question: &Question) -> Result<bool> {
        {
            let mut out = self.output.borrow_mut();
            out.write_all(question.prompt().as_bytes())?;
            out.flush()?;
        }
        let mut line = String::new();
        self.input.borrow_mut().read_line(&mut line)?;
        let answer = line.trim().to_ascii_lowercase();
        Ok(answer == "y" || answer == "yes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn quality_question() -> Question {
        Question::ContinueDespiteQuality {
            issue: QualityIssue::InsufficientVolume { total: 12 },
        }
    }

    fn deploy_question() -> Question {
        Question::ConfirmDeployment {
            artifact: PathBuf::from("models/phishing_detection_model"),
        }
    }

    #[test]
    fn auto_approves_deployment() {
        let d = AutoDecider {
            continue_on_quality_failure: false,
        };
        assert!(d.decide(&deploy_question()).unwrap());
        assert!(!d.decide(&quality_question()).unwrap());
    }

    #[test]
    fn auto_quality_default_is_configurable() {
        let d = AutoDecider {
            continue_on_quality_failure: true,
        };
        assert!(d.decide(&quality_question()).unwrap());
    }

    #[test]
    fn prompt_accepts_yes_variants() {
        for input in ["y\n", "Y\n", "yes\n", "  YES  \n"] {
            let d = PromptDecider::new(Cursor::new(input), Vec::new());
            assert!(d.decide(&deploy_question()).unwrap(), "input {input:?}");
        }
    }

    #[test]
    fn prompt_declines_otherwise() {
        for input in ["n\n", "\n", "", "sure\n"] {
            let d = PromptDecider::new(Cursor::new(input), Vec::new());
            assert!(!d.decide(&deploy_question()).unwrap(), "input {input:?}");
        }
    }

    #[test]
    fn prompt_writes_question() {
        let d = PromptDecider::new(Cursor::new("n\n"), Vec::new());
        d.decide(&quality_question()).unwrap();
        let shown = String::from_utf8(d.output.into_inner()).unwrap();
        assert!(shown.contains("insufficient volume"));
        assert!(shown.ends_with("(y/n): "));
    }

    #[test]
    fn prompt_reads_one_line_per_question() {
        let d = PromptDecider::new(Cursor::new("y\nn\n"), Vec::new());
        assert!(d.decide(&quality_question()).unwrap());
        assert!(!d.decide(&deploy_question()).unwrap());
    }
}
