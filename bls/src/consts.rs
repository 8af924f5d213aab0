pub const COMPRESSED_PUBLIC_KEY_SIZE: usize = 48;
pub const COMPRESSED_SIGNATURE_SIZE: usize = 96;
pub const SECRET_KEY_SIZE: usize = 32;

// `POP` stands for proof of possession. Deposits are signed with the same scheme as everything else.
pub const DOMAIN_SEPARATION_TAG: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_POP_";
