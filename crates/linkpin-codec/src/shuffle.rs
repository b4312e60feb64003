/// Deterministically permutes `alphabet` using `salt` as the key.
///
/// An empty salt leaves the alphabet untouched.
pub(crate) fn consistent_shuffle(alphabet: &mut [u8], salt: &[u32]) {
    if salt.is_empty() {
        return;
    }

    let mut index = 0_usize;
    let mut sum = 0_u64;
    for i in (1..alphabet.len()).rev() {
        let value = u64::from(salt[index]);
        sum += value;
        let j = (value + index as u64 + sum) % i as u64;
        alphabet.swap(i, j as usize);
        index = (index + 1) % salt.len();
    }
}

pub(crate) fn as_salt(bytes: &[u8]) -> Vec<u32> {
    bytes.iter().map(|&b| u32::from(b)).collect()
}
