//! Message kinds.

use serde::{Deserialize, Serialize};

/// Every message kind on the wire. Discriminants are part of the protocol
/// and must not be renumbered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageKind {
    Transactions = 1,
    TransactionList = 3,
    ConsVector = 4,
    ConsMatrix = 5,
    NewBlock = 6,
    BlockHash = 7,
    BlockRequest = 8,
    RequestedBlock = 9,
    ConsVectorRequest = 11,
    ConsMatrixRequest = 12,
    ConsTLRequest = 13,
    RoundTableRequest = 14,
    NewBadBlock = 15,
    FirstStage = 16,
    SecondStage = 17,
    ThirdStage = 18,
    FirstStageRequest = 19,
    SecondStageRequest = 20,
    ThirdStageRequest = 21,
    RoundInfo = 22,
    RoundInfoRequest = 23,
    RoundInfoReply = 24,
    BigBang = 35,
    TransactionPacket = 36,
    TransactionsPacketRequest = 37,
    TransactionsPacketReply = 38,
    NewCharacteristic = 39,
    RoundTable = 40,
    WriterNotification = 41,
}

impl MessageKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        use MessageKind::*;
        Some(match value {
            1 => Transactions,
            3 => TransactionList,
            4 => ConsVector,
            5 => ConsMatrix,
            6 => NewBlock,
            7 => BlockHash,
            8 => BlockRequest,
            9 => RequestedBlock,
            11 => ConsVectorRequest,
            12 => ConsMatrixRequest,
            13 => ConsTLRequest,
            14 => RoundTableRequest,
            15 => NewBadBlock,
            16 => FirstStage,
            17 => SecondStage,
            18 => ThirdStage,
            19 => FirstStageRequest,
            20 => SecondStageRequest,
            21 => ThirdStageRequest,
            22 => RoundInfo,
            23 => RoundInfoRequest,
            24 => RoundInfoReply,
            35 => BigBang,
            36 => TransactionPacket,
            37 => TransactionsPacketRequest,
            38 => TransactionsPacketReply,
            39 => NewCharacteristic,
            40 => RoundTable,
            41 => WriterNotification,
            _ => return None,
        })
    }
}
