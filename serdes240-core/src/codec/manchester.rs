use crate::error::DecodeError;

pub const SYMBOLS_PER_WORD: usize = 16;

/// Line level for one serial tick.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum Symbol {
    #[default]
    Low,
    High,
}

impl Symbol {
    pub fn from_bit(bit: bool) -> Self {
        if bit {
            Symbol::High
        } else {
            Symbol::Low
        }
    }

    pub fn is_high(&self) -> bool {
        *self == Symbol::High
    }

    pub fn inverted(&self) -> Self {
        match self {
            Symbol::Low => Symbol::High,
            Symbol::High => Symbol::Low,
        }
    }
}

/// Encoded word: 16 symbols, the first to be sent in bit 15, High = 1.
pub type SymbolWord = u16;

const PAIR_ZERO: u16 = 0b10;
const PAIR_ONE: u16 = 0b01;

/// Biphase-encode a byte, MSB first. A 0 bit is (High, Low), a 1 bit is
/// (Low, High).
pub fn encode(byte: u8) -> SymbolWord {
    (0..8).rev().fold(0, |word, i| {
        let pair = if (byte >> i) & 1 == 0 { PAIR_ZERO } else { PAIR_ONE };
        (word << 2) | pair
    })
}

pub fn decode_pair(first: Symbol, second: Symbol) -> Result<bool, DecodeError> {
    match (first, second) {
        (Symbol::High, Symbol::Low) => Ok(false),
        (Symbol::Low, Symbol::High) => Ok(true),
        _ => Err(DecodeError::MalformedPair(first, second)),
    }
}

pub fn decode(word: SymbolWord) -> Result<u8, DecodeError> {
    let mut byte = 0;
    for bit in 0..8 {
        let first = symbol_at(word, 2 * bit);
        let second = symbol_at(word, 2 * bit + 1);
        let value = decode_pair(first, second)
            .map_err(|_| DecodeError::MalformedWord { bit })?;
        byte = (byte << 1) | value as u8;
    }
    Ok(byte)
}

/// Symbol `index` in transmission order.
pub fn symbol_at(word: SymbolWord, index: usize) -> Symbol {
    debug_assert!(index < SYMBOLS_PER_WORD);
    Symbol::from_bit((word >> (SYMBOLS_PER_WORD - 1 - index)) & 1 != 0)
}

pub fn symbols(word: SymbolWord) -> impl Iterator<Item = Symbol> {
    (0..SYMBOLS_PER_WORD).map(move |index| symbol_at(word, index))
}

#[cfg(test)]
mod tests {
    use quickcheck::quickcheck;

    use super::*;

    #[test]
    fn encoder_known_values() {
        let expected = [
            (0x00, 0b1010_1010_1010_1010),
            (0xff, 0b0101_0101_0101_0101),
            (0xa5, 0b0110_0110_1001_1001),
            (0x80, 0b0110_1010_1010_1010),
            (0x01, 0b1010_1010_1010_1001),
        ];

        for (byte, word) in expected {
            assert_eq!(encode(byte), word, "encoding pair {:?}", (byte, word));
        }
    }

    #[test]
    fn first_symbol_is_msb() {
        let sent: Vec<Symbol> = symbols(encode(0x80)).take(4).collect();
        assert_eq!(sent, [Symbol::Low, Symbol::High, Symbol::High, Symbol::Low]);
    }

    #[test]
    fn malformed_pairs_rejected() {
        assert_eq!(decode_pair(Symbol::High, Symbol::High), Err(DecodeError::MalformedPair(Symbol::High, Symbol::High)));
        assert_eq!(decode_pair(Symbol::Low, Symbol::Low), Err(DecodeError::MalformedPair(Symbol::Low, Symbol::Low)));

        // Third pair forced to (Low, Low).
        let word = encode(0x00) & !0b0000_1100_0000_0000;
        assert_eq!(decode(word), Err(DecodeError::MalformedWord { bit: 2 }));
    }

    quickcheck! {
        fn round_trip(byte: u8) -> bool {
            decode(encode(byte)) == Ok(byte)
        }

        fn every_pair_is_well_formed(byte: u8) -> bool {
            let word = encode(byte);
            (0..8).all(|bit| decode_pair(symbol_at(word, 2 * bit), symbol_at(word, 2 * bit + 1)).is_ok())
        }
    }
}
