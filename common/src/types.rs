#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalQuality {
    Excellent,
    Good,
    Fair,
    Weak,
    Poor,
}

impl SignalQuality {
    pub fn from_dbm(rssi_dbm: i32) -> Self {
        match rssi_dbm {
            rssi if rssi >= -50 => Self::Excellent,
            rssi if rssi >= -60 => Self::Good,
            rssi if rssi >= -70 => Self::Fair,
            rssi if rssi >= -80 => Self::Weak,
            _ => Self::Poor,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::Weak => "Weak",
            Self::Poor => "Poor",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComfortLevel {
    VeryComfortable,
    Comfortable,
    Moderate,
    Uncomfortable,
    VeryUncomfortable,
}

impl ComfortLevel {
    pub fn from_score(comfort: f64) -> Self {
        if comfort >= 0.8 {
            Self::VeryComfortable
        } else if comfort >= 0.6 {
            Self::Comfortable
        } else if comfort >= 0.4 {
            Self::Moderate
        } else if comfort >= 0.2 {
            Self::Uncomfortable
        } else {
            Self::VeryUncomfortable
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::VeryComfortable => "Very Comfortable",
            Self::Comfortable => "Comfortable",
            Self::Moderate => "Moderate",
            Self::Uncomfortable => "Uncomfortable",
            Self::VeryUncomfortable => "Very Uncomfortable",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_bands_are_inclusive_at_lower_edge() {
        assert_eq!(SignalQuality::from_dbm(-30), SignalQuality::Excellent);
        assert_eq!(SignalQuality::from_dbm(-50), SignalQuality::Excellent);
        assert_eq!(SignalQuality::from_dbm(-51), SignalQuality::Good);
        assert_eq!(SignalQuality::from_dbm(-60), SignalQuality::Good);
        assert_eq!(SignalQuality::from_dbm(-70), SignalQuality::Fair);
        assert_eq!(SignalQuality::from_dbm(-80), SignalQuality::Weak);
        assert_eq!(SignalQuality::from_dbm(-81), SignalQuality::Poor);
        assert_eq!(SignalQuality::from_dbm(-100), SignalQuality::Poor);
    }

    #[test]
    fn comfort_bands_match_labels() {
        let labels: Vec<&str> = [0.95, 0.8, 0.79, 0.6, 0.4, 0.2, 0.19, 0.0]
            .into_iter()
            .map(|score| ComfortLevel::from_score(score).as_str())
            .collect();

        assert_eq!(
            labels,
            vec![
                "Very Comfortable",
                "Very Comfortable",
                "Comfortable",
                "Comfortable",
                "Moderate",
                "Uncomfortable",
                "Very Uncomfortable",
                "Very Uncomfortable",
            ]
        );
    }
}
