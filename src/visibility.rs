/// Categories of the enquiry-type selector that drive field visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnquiryType {
    Tender,
    Referral,
    /// Any other value, including an empty or missing selector.
    Other,
}

impl EnquiryType {
    pub fn from_value(value: &str) -> Self {
        match value {
            "tender" => Self::Tender,
            "referral" => Self::Referral,
            _ => Self::Other,
        }
    }

    pub fn visibility(self) -> GroupVisibility {
        match self {
            Self::Tender => GroupVisibility {
                tender: true,
                referral: false,
            },
            Self::Referral => GroupVisibility {
                tender: false,
                referral: true,
            },
            Self::Other => GroupVisibility::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupVisibility {
    pub tender: bool,
    pub referral: bool,
}
