// Unsigned transaction builders shared by every chain client backend.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use aegis_common::{
    crypto::Address,
    transaction::{AccountMeta, Instruction, TransactionMessage, UnsignedTransaction},
};

pub const SYSTEM_PROGRAM_ID: &str = "11111111111111111111111111111111";
pub const TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";
pub const MEMO_PROGRAM_ID: &str = "MemoSq4gqABAXKb96qnH8TysNcWxMyWCqXgDLGmfcHr";

// System program transfer: u32 opcode 2 followed by the amount
const SYSTEM_TRANSFER_OPCODE: u32 = 2;
// Token program transfer-checked: u8 opcode 12, amount, decimals
const TOKEN_TRANSFER_CHECKED_OPCODE: u8 = 12;

fn program_address(id: &str) -> Address {
    Address::parse(id).expect("well-known program id is valid")
}

pub fn transfer_instruction(from: &Address, to: &Address, amount: u64) -> Instruction {
    let mut data = Vec::with_capacity(12);
    data.extend_from_slice(&SYSTEM_TRANSFER_OPCODE.to_le_bytes());
    data.extend_from_slice(&amount.to_le_bytes());
    Instruction {
        program_id: program_address(SYSTEM_PROGRAM_ID),
        accounts: vec![
            AccountMeta {
                pubkey: from.clone(),
                is_signer: true,
                is_writable: true,
            },
            AccountMeta {
                pubkey: to.clone(),
                is_signer: false,
                is_writable: true,
            },
        ],
        data: BASE64.encode(data),
    }
}

pub fn token_transfer_instruction(
    owner: &Address,
    mint: &Address,
    recipient: &Address,
    raw_amount: u64,
    decimals: u8,
) -> Instruction {
    let mut data = Vec::with_capacity(10);
    data.push(TOKEN_TRANSFER_CHECKED_OPCODE);
    data.extend_from_slice(&raw_amount.to_le_bytes());
    data.push(decimals);
    Instruction {
        program_id: program_address(TOKEN_PROGRAM_ID),
        accounts: vec![
            AccountMeta {
                pubkey: owner.clone(),
                is_signer: true,
                is_writable: true,
            },
            AccountMeta {
                pubkey: mint.clone(),
                is_signer: false,
                is_writable: false,
            },
            AccountMeta {
                pubkey: recipient.clone(),
                is_signer: false,
                is_writable: true,
            },
        ],
        data: BASE64.encode(data),
    }
}

pub fn memo_instruction(signer: &Address, memo: &str) -> Instruction {
    Instruction {
        program_id: program_address(MEMO_PROGRAM_ID),
        accounts: vec![AccountMeta {
            pubkey: signer.clone(),
            is_signer: true,
            is_writable: false,
        }],
        data: BASE64.encode(memo.as_bytes()),
    }
}

pub fn native_transfer(
    from: &Address,
    to: &Address,
    amount: u64,
    memo: Option<String>,
    recent_blockhash: String,
) -> UnsignedTransaction {
    let mut instructions = vec![transfer_instruction(from, to, amount)];
    if let Some(text) = &memo {
        instructions.push(memo_instruction(from, text));
    }
    UnsignedTransaction::Legacy {
        message: TransactionMessage {
            fee_payer: from.clone(),
            recent_blockhash,
            instructions,
            memo,
        },
    }
}

pub fn token_transfer(
    owner: &Address,
    mint: &Address,
    recipient: &Address,
    raw_amount: u64,
    decimals: u8,
    memo: Option<String>,
    recent_blockhash: String,
) -> UnsignedTransaction {
    let mut instructions = vec![token_transfer_instruction(
        owner, mint, recipient, raw_amount, decimals,
    )];
    if let Some(text) = &memo {
        instructions.push(memo_instruction(owner, text));
    }
    UnsignedTransaction::Legacy {
        message: TransactionMessage {
            fee_payer: owner.clone(),
            recent_blockhash,
            instructions,
            memo,
        },
    }
}

// Caller-supplied instruction arrays ride in the versioned shape
pub fn arbitrary(
    fee_payer: &Address,
    instructions: Vec<Instruction>,
    memo: Option<String>,
    recent_blockhash: String,
) -> UnsignedTransaction {
    let mut instructions = instructions;
    if let Some(text) = &memo {
        instructions.push(memo_instruction(fee_payer, text));
    }
    UnsignedTransaction::Versioned {
        message: TransactionMessage {
            fee_payer: fee_payer.clone(),
            recent_blockhash,
            instructions,
            memo,
        },
    }
}

// Amount carried by a system-program transfer instruction, if it is one.
// The mock backend uses this to mirror balance movements.
pub fn decode_transfer_amount(instruction: &Instruction) -> Option<u64> {
    if instruction.program_id.as_str() != SYSTEM_PROGRAM_ID {
        return None;
    }
    let data = BASE64.decode(&instruction.data).ok()?;
    if data.len() != 12 {
        return None;
    }
    let opcode = u32::from_le_bytes(data[..4].try_into().ok()?);
    if opcode != SYSTEM_TRANSFER_OPCODE {
        return None;
    }
    Some(u64::from_le_bytes(data[4..].try_into().ok()?))
}
