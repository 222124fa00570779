pub(crate) const CACHE_SIZE: usize = 256;
pub(crate) const MAX_CHARS: usize = 250;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Endianness {
    Big,
    Little,
    Native,
}

impl Endianness {
    pub fn from_prefix(c: char) -> Option<Endianness> {
        match c {
            '>' => Some(Endianness::Big),
            '<' => Some(Endianness::Little),
            '@' | '=' => Some(Endianness::Native),
            _ => None,
        }
    }
}

pub(crate) const PACK_CODE_SIZE: &[(char, u32)] = &[
    ('b', 1),
    ('B', 1),
    ('h', 2),
    ('H', 2),
    ('l', 4),
    ('L', 4),
    ('q', 8),
    ('Q', 8),
    ('e', 2),
    ('f', 4),
    ('d', 8),
];

pub(crate) fn pack_code_bytes(code: char) -> Option<u32> {
    PACK_CODE_SIZE.iter().find(|(c, _)| *c == code).map(|(_, n)| *n)
}

pub(crate) fn struct_code_token(code: char, endian: Endianness) -> Option<&'static str> {
    let name = match (code, endian) {
        ('b', _) => "int8",
        ('B', _) => "uint8",
        ('h', Endianness::Big) => "intbe16",
        ('H', Endianness::Big) => "uintbe16",
        ('l', Endianness::Big) => "intbe32",
        ('L', Endianness::Big) => "uintbe32",
        ('q', Endianness::Big) => "intbe64",
        ('Q', Endianness::Big) => "uintbe64",
        ('e', Endianness::Big) => "floatbe16",
        ('f', Endianness::Big) => "floatbe32",
        ('d', Endianness::Big) => "floatbe64",
        ('h', Endianness::Little) => "intle16",
        ('H', Endianness::Little) => "uintle16",
        ('l', Endianness::Little) => "intle32",
        ('L', Endianness::Little) => "uintle32",
        ('q', Endianness::Little) => "intle64",
        ('Q', Endianness::Little) => "uintle64",
        ('e', Endianness::Little) => "floatle16",
        ('f', Endianness::Little) => "floatle32",
        ('d', Endianness::Little) => "floatle64",
        ('h', Endianness::Native) => "intne16",
        ('H', Endianness::Native) => "uintne16",
        ('l', Endianness::Native) => "intne32",
        ('L', Endianness::Native) => "uintne32",
        ('q', Endianness::Native) => "intne64",
        ('Q', Endianness::Native) => "uintne64",
        ('e', Endianness::Native) => "floatne16",
        ('f', Endianness::Native) => "floatne32",
        ('d', Endianness::Native) => "floatne64",
        _ => return None,
    };
    Some(name)
}
