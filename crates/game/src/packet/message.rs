/// Localizable messages the client resolves by id; parameters are sent as strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum GameMessage {
    InvalidAccount = 1,
    AccountInUse = 2,
    CommandShout = 10,
    CommandTellSender = 11,
    CommandTellReceiver = 12,
    CommandTellInvalidUser = 13,
    CommandTellNoName = 14,
    CommandTellNoMessage = 15,
    CommandUnknown = 16,
    ShopInsufficientFundsToPurchaseSingular = 20,
    ShopInsufficientFundsToPurchasePlural = 21,
    ShopPurchaseSingular = 22,
    ShopPurchasePlural = 23,
    ShopInventoryFull = 24,
}

impl GameMessage {
    pub fn id(self) -> u16 {
        self as u16
    }

    pub fn from_id(id: u16) -> Option<Self> {
        let msg = match id {
            1 => Self::InvalidAccount,
            2 => Self::AccountInUse,
            10 => Self::CommandShout,
            11 => Self::CommandTellSender,
            12 => Self::CommandTellReceiver,
            13 => Self::CommandTellInvalidUser,
            14 => Self::CommandTellNoName,
            15 => Self::CommandTellNoMessage,
            16 => Self::CommandUnknown,
            20 => Self::ShopInsufficientFundsToPurchaseSingular,
            21 => Self::ShopInsufficientFundsToPurchasePlural,
            22 => Self::ShopPurchaseSingular,
            23 => Self::ShopPurchasePlural,
            24 => Self::ShopInventoryFull,
            _ => return None,
        };
        Some(msg)
    }
}
