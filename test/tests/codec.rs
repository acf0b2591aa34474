//! Round-trip properties for the bit-level codec: for every registered
//! value, decode(encode(v)) == v, and field order is the contract.

use proptest::prelude::*;

use replink_serde::{
    BitReader, BitWriter, Serde, SignedVariableInteger, UnsignedInteger, UnsignedVariableInteger,
};

fn round_trip<T: Serde + PartialEq + std::fmt::Debug>(value: &T) {
    let mut writer = BitWriter::new();
    value.ser(&mut writer);
    assert_eq!(writer.bits_written(), value.bit_length());

    let bytes = writer.to_bytes();
    let mut reader = BitReader::new(&bytes);
    assert_eq!(&T::de(&mut reader).unwrap(), value);
}

proptest! {
    #[test]
    fn bools(value: bool) {
        round_trip(&value);
    }

    #[test]
    fn unsigned_ints(a: u8, b: u16, c: u32, d: u64) {
        round_trip(&a);
        round_trip(&b);
        round_trip(&c);
        round_trip(&d);
    }

    #[test]
    fn signed_ints(a: i8, b: i16, c: i32, d: i64) {
        round_trip(&a);
        round_trip(&b);
        round_trip(&c);
        round_trip(&d);
    }

    #[test]
    fn floats(a: f32, b: f64) {
        // bit-cast encoding: NaN payloads survive too, so compare bits
        let mut writer = BitWriter::new();
        a.ser(&mut writer);
        b.ser(&mut writer);
        let bytes = writer.to_bytes();
        let mut reader = BitReader::new(&bytes);
        prop_assert_eq!(f32::de(&mut reader).unwrap().to_bits(), a.to_bits());
        prop_assert_eq!(f64::de(&mut reader).unwrap().to_bits(), b.to_bits());
    }

    #[test]
    fn strings(value in ".{0,40}") {
        round_trip(&value);
    }

    #[test]
    fn vecs(value in proptest::collection::vec(any::<u32>(), 0..24)) {
        round_trip(&value);
    }

    #[test]
    fn options(value: Option<u16>) {
        round_trip(&value);
    }

    #[test]
    fn fixed_width_integers(value in 0i64..(1 << 20)) {
        round_trip(&UnsignedInteger::<20>::new(value));
    }

    #[test]
    fn variable_width_integers(value in 0i64..(1i64 << 40)) {
        round_trip(&UnsignedVariableInteger::<7>::new(value));
    }

    #[test]
    fn signed_variable_width_integers(value in -(1i64 << 30)..(1i64 << 30)) {
        round_trip(&SignedVariableInteger::<5>::new(value));
    }

    #[test]
    fn heterogeneous_field_sequences(flag: bool, count: u16, label in ".{0,16}", ratio: f32) {
        // no self-describing framing: fields decode only in write order
        let mut writer = BitWriter::new();
        flag.ser(&mut writer);
        count.ser(&mut writer);
        label.ser(&mut writer);
        ratio.ser(&mut writer);
        let bytes = writer.to_bytes();

        let mut reader = BitReader::new(&bytes);
        prop_assert_eq!(bool::de(&mut reader).unwrap(), flag);
        prop_assert_eq!(u16::de(&mut reader).unwrap(), count);
        prop_assert_eq!(String::de(&mut reader).unwrap(), label);
        prop_assert_eq!(f32::de(&mut reader).unwrap().to_bits(), ratio.to_bits());
    }

    #[test]
    fn truncation_never_panics(payload in proptest::collection::vec(any::<u8>(), 0..64)) {
        // decoding arbitrary bytes either succeeds or errors, never panics
        let mut reader = BitReader::new(&payload);
        let _ = String::de(&mut reader);
        let mut reader = BitReader::new(&payload);
        let _ = Vec::<u64>::de(&mut reader);
        let mut reader = BitReader::new(&payload);
        let _ = UnsignedVariableInteger::<3>::de(&mut reader);
    }
}
