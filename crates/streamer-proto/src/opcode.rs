/// The protocol's 16-bit opcode registry.
///
/// Numeric values match the original implementation's autogenerated
/// `msgcodes.h` one for one (open/control/status opcodes group under
/// `0x1xxx`/`0x2xxx` prefixes by category, responses under `0xF0xx`; `RERR`
/// is the universal `0xFFFF` ack/error envelope). See `DESIGN.md`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Opcode {
    // Open, unauthenticated requests.
    Info = 0x0000,
    Auth = 0x0001,
    SspsServicePrimarySelect = 0x2101,
    SsflServiceFilterList = 0x2102,
    SspcServiceFilterPacketCount = 0x2103,
    SoloOutputList = 0x2201,
    SolpOutputListPids = 0x2202,
    SopcOutputPacketCount = 0x2203,
    StssTsStats = 0x2F01,
    SfesFeStatus = 0x2F02,
    SslaServiceListAll = 0x2F03,
    SslmServiceListMultiplex = 0x2F04,
    SsplServicePids = 0x2F05,

    // Control requests, require authentication.
    Quot = 0x0002,
    CspsServicePrimarySelect = 0x1101,
    CssaServiceSecondaryAdd = 0x1102,
    CsssServiceSecondarySet = 0x1103,
    CssrServiceSecondaryRemove = 0x1104,
    CssdServiceSetDestination = 0x1105,
    CoaoOutputAdd = 0x1201,
    CoroOutputRemove = 0x1202,
    CoapOutputPidAdd = 0x1203,
    CorpOutputPidRemove = 0x1204,
    CosdOutputSetDestination = 0x1205,

    // Responses with a fixed, non-RERR shape.
    Rssl = 0xF001,
    Rolo = 0xF002,
    Rlp = 0xF003,
    Ropc = 0xF004,
    Rtss = 0xF005,
    Rfes = 0xF006,
    Rls = 0xF007,
    Rtxt = 0xF008,

    /// Universal ack/error envelope: `[code:b][text:s]`.
    Rerr = 0xFFFF,
}

impl Opcode {
    pub const fn is_control(self) -> bool {
        matches!(
            self,
            Opcode::Quot
                | Opcode::CspsServicePrimarySelect
                | Opcode::CssaServiceSecondaryAdd
                | Opcode::CsssServiceSecondarySet
                | Opcode::CssrServiceSecondaryRemove
                | Opcode::CssdServiceSetDestination
                | Opcode::CoaoOutputAdd
                | Opcode::CoroOutputRemove
                | Opcode::CoapOutputPidAdd
                | Opcode::CorpOutputPidRemove
                | Opcode::CosdOutputSetDestination
        )
    }
}

impl TryFrom<u16> for Opcode {
    type Error = u16;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Ok(match value {
            0x0000 => Opcode::Info,
            0x0001 => Opcode::Auth,
            0x0002 => Opcode::Quot,
            0x1101 => Opcode::CspsServicePrimarySelect,
            0x1102 => Opcode::CssaServiceSecondaryAdd,
            0x1103 => Opcode::CsssServiceSecondarySet,
            0x1104 => Opcode::CssrServiceSecondaryRemove,
            0x1105 => Opcode::CssdServiceSetDestination,
            0x1201 => Opcode::CoaoOutputAdd,
            0x1202 => Opcode::CoroOutputRemove,
            0x1203 => Opcode::CoapOutputPidAdd,
            0x1204 => Opcode::CorpOutputPidRemove,
            0x1205 => Opcode::CosdOutputSetDestination,
            0x2101 => Opcode::SspsServicePrimarySelect,
            0x2102 => Opcode::SsflServiceFilterList,
            0x2103 => Opcode::SspcServiceFilterPacketCount,
            0x2201 => Opcode::SoloOutputList,
            0x2202 => Opcode::SolpOutputListPids,
            0x2203 => Opcode::SopcOutputPacketCount,
            0x2F01 => Opcode::StssTsStats,
            0x2F02 => Opcode::SfesFeStatus,
            0x2F03 => Opcode::SslaServiceListAll,
            0x2F04 => Opcode::SslmServiceListMultiplex,
            0x2F05 => Opcode::SsplServicePids,
            0xF001 => Opcode::Rssl,
            0xF002 => Opcode::Rolo,
            0xF003 => Opcode::Rlp,
            0xF004 => Opcode::Ropc,
            0xF005 => Opcode::Rtss,
            0xF006 => Opcode::Rfes,
            0xF007 => Opcode::Rls,
            0xF008 => Opcode::Rtxt,
            0xFFFF => Opcode::Rerr,
            other => return Err(other),
        })
    }
}

impl From<Opcode> for u16 {
    fn from(op: Opcode) -> Self {
        op as u16
    }
}

/// `RERR` error codes (§6 of the error code registry).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorCode {
    Ok = 0x00,
    NotAuthorised = 0x01,
    Exists = 0x02,
    NotFound = 0x03,
    Streaming = 0x04,
    Generic = 0xFF,
}

impl From<ErrorCode> for u8 {
    fn from(code: ErrorCode) -> Self {
        code as u8
    }
}
