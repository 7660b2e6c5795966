//! Six-slot OTP entry buffer.
//!
//! Models the code-entry widget: one digit per slot, a focus index that
//! auto-advances, backspace that walks backwards, and paste that distributes
//! digits from the first slot. Completion is reported by the mutating calls
//! so the caller can auto-submit.

/// Number of digits in an OTP.
pub const OTP_LEN: usize = 6;

/// What a mutating keystroke produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpEvent {
    /// Slots remain to fill (or the input was ignored).
    Pending,
    /// All six slots are filled as of this call; submit now.
    Complete,
}

/// The entry buffer: six optional digits plus the focused slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpEntry {
    slots: [Option<char>; OTP_LEN],
    focus: usize,
}

impl Default for OtpEntry {
    fn default() -> Self {
        Self::new()
    }
}

impl OtpEntry {
    /// Empty buffer, focus on the first slot.
    pub fn new() -> Self {
        Self {
            slots: [None; OTP_LEN],
            focus: 0,
        }
    }

    /// Type one character into the focused slot.
    ///
    /// Non-digits are ignored. A digit fills the focused slot and advances
    /// the focus; filling the last empty slot reports [`OtpEvent::Complete`].
    /// Once the buffer is complete further keystrokes are ignored, so a
    /// stray seventh digit cannot mutate or resubmit the code.
    pub fn type_digit(&mut self, c: char) -> OtpEvent {
        if !c.is_ascii_digit() || self.is_complete() {
            return OtpEvent::Pending;
        }

        self.slots[self.focus] = Some(c);
        if self.focus < OTP_LEN - 1 {
            self.focus += 1;
        }

        if self.is_complete() {
            OtpEvent::Complete
        } else {
            OtpEvent::Pending
        }
    }

    /// Clear the focused slot, or step back and clear the previous one when
    /// the focused slot is already empty.
    pub fn backspace(&mut self) {
        if self.slots[self.focus].is_some() {
            self.slots[self.focus] = None;
        } else if self.focus > 0 {
            self.focus -= 1;
            self.slots[self.focus] = None;
        }
    }

    /// Distribute pasted text across the slots.
    ///
    /// Non-digits are stripped, the rest fills slots left to right from slot
    /// 0 (replacing whatever was there), truncated to six. Reports
    /// [`OtpEvent::Complete`] at most once, when the paste supplied all six.
    pub fn paste(&mut self, text: &str) -> OtpEvent {
        let digits: Vec<char> = text
            .chars()
            .filter(char::is_ascii_digit)
            .take(OTP_LEN)
            .collect();

        if digits.is_empty() {
            return OtpEvent::Pending;
        }

        self.clear();
        for (i, d) in digits.iter().enumerate() {
            self.slots[i] = Some(*d);
        }
        self.focus = digits.len().min(OTP_LEN - 1);

        if digits.len() == OTP_LEN {
            OtpEvent::Complete
        } else {
            OtpEvent::Pending
        }
    }

    /// The full code, present only when all six slots are filled.
    pub fn code(&self) -> Option<String> {
        self.slots.iter().copied().collect::<Option<String>>()
    }

    /// Whether every slot holds a digit.
    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    /// Empty all slots and refocus the first one.
    pub fn clear(&mut self) {
        self.slots = [None; OTP_LEN];
        self.focus = 0;
    }

    /// The focused slot index.
    pub fn focus(&self) -> usize {
        self.focus
    }
}
