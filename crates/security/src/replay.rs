//! Replay-Fenster pro Gegenstelle
//!
//! Merkt sich die zuletzt gesehenen Sequenznummern eines Knotens in
//! einem kleinen Ringpuffer. Eine bereits gesehene Sequenznummer wird
//! als Replay gewertet; das Fenster selbst entscheidet nicht, nur die
//! Engine verwirft.

/// Anzahl gemerkter Sequenznummern
const FENSTER_GROESSE: usize = 8;

/// Ringpuffer der zuletzt gesehenen Sequenznummern
#[derive(Debug, Default)]
pub struct ReplayFenster {
    gesehen: Vec<u8>,
    position: usize,
}

impl ReplayFenster {
    pub fn neu() -> Self {
        Self::default()
    }

    /// True wenn die Sequenznummer bereits im Fenster liegt
    pub fn ist_replay(&self, sequenz: u8) -> bool {
        self.gesehen.contains(&sequenz)
    }

    /// Merkt sich eine akzeptierte Sequenznummer
    pub fn merken(&mut self, sequenz: u8) {
        if self.gesehen.len() < FENSTER_GROESSE {
            self.gesehen.push(sequenz);
        } else {
            self.gesehen[self.position] = sequenz;
        }
        self.position = (self.position + 1) % FENSTER_GROESSE;
    }

    /// Leert das Fenster (z.B. nach Schluessel-Wechsel)
    pub fn zuruecksetzen(&mut self) {
        self.gesehen.clear();
        self.position = 0;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
