/// Encode a motor target as a 16-bit Aseba word.
///
/// Aseba variables are `i16`; values outside that range saturate.
pub fn to_aseba_word(value: i32) -> i16 {
    match i16::try_from(value) {
        Ok(word) => word,
        Err(_) => {
            log::warn!("motor target {} exceeds aseba word range; saturating", value);
            if value < 0 {
                i16::MIN
            } else {
                i16::MAX
            }
        }
    }
}
