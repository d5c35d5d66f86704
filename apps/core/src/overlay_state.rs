#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayPhase {
    Hidden,
    Shown,
    FadingOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayTransition {
    Show,
    BeginHide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayState {
    phase: OverlayPhase,
}

impl Default for OverlayState {
    fn default() -> Self {
        Self {
            phase: OverlayPhase::Hidden,
        }
    }
}

impl OverlayState {
    pub fn phase(&self) -> OverlayPhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase == OverlayPhase::Shown
    }

    pub fn toggle(&mut self) -> OverlayTransition {
        match self.phase {
            OverlayPhase::Shown => {
                self.phase = OverlayPhase::FadingOut;
                OverlayTransition::BeginHide
            }
            OverlayPhase::Hidden | OverlayPhase::FadingOut => {
                self.phase = OverlayPhase::Shown;
                OverlayTransition::Show
            }
        }
    }

    pub fn on_escape(&mut self) -> bool {
        self.close()
    }

    pub fn close(&mut self) -> bool {
        if self.phase == OverlayPhase::Shown {
            self.phase = OverlayPhase::FadingOut;
            return true;
        }
        false
    }

    pub fn finish_hide(&mut self) -> bool {
        if self.phase == OverlayPhase::FadingOut {
            self.phase = OverlayPhase::Hidden;
            return true;
        }
        false
    }
}
