//! Status codes
//!
//! A status code is a u32. Bits 30-31 carry the severity (00 good,
//! 01 uncertain, 10/11 bad); bits 16-29 carry the sub-code. The lower 16
//! bits are flags and are ignored when naming a code.

use crate::encoding::{BinaryDecode, BinaryEncode, EncodingResult};

/// A 32-bit OPC UA status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StatusCode(pub u32);

impl StatusCode {
    pub const GOOD: StatusCode = StatusCode(0);

    pub const BAD_UNEXPECTED_ERROR: StatusCode = StatusCode(0x8001_0000);
    pub const BAD_INTERNAL_ERROR: StatusCode = StatusCode(0x8002_0000);
    pub const BAD_OUT_OF_MEMORY: StatusCode = StatusCode(0x8003_0000);
    pub const BAD_RESOURCE_UNAVAILABLE: StatusCode = StatusCode(0x8004_0000);
    pub const BAD_COMMUNICATION_ERROR: StatusCode = StatusCode(0x8005_0000);
    pub const BAD_ENCODING_ERROR: StatusCode = StatusCode(0x8006_0000);
    pub const BAD_DECODING_ERROR: StatusCode = StatusCode(0x8007_0000);
    pub const BAD_ENCODING_LIMITS_EXCEEDED: StatusCode = StatusCode(0x8008_0000);
    pub const BAD_TIMEOUT: StatusCode = StatusCode(0x800A_0000);
    pub const BAD_SERVICE_UNSUPPORTED: StatusCode = StatusCode(0x800B_0000);
    pub const BAD_SHUTDOWN: StatusCode = StatusCode(0x800C_0000);
    pub const BAD_SERVER_NOT_CONNECTED: StatusCode = StatusCode(0x800D_0000);
    pub const BAD_NOTHING_TO_DO: StatusCode = StatusCode(0x800F_0000);
    pub const BAD_TOO_MANY_OPERATIONS: StatusCode = StatusCode(0x8010_0000);
    pub const BAD_CERTIFICATE_INVALID: StatusCode = StatusCode(0x8012_0000);
    pub const BAD_SECURITY_CHECKS_FAILED: StatusCode = StatusCode(0x8013_0000);
    pub const BAD_CERTIFICATE_UNTRUSTED: StatusCode = StatusCode(0x801A_0000);
    pub const BAD_USER_ACCESS_DENIED: StatusCode = StatusCode(0x801F_0000);
    pub const BAD_IDENTITY_TOKEN_INVALID: StatusCode = StatusCode(0x8020_0000);
    pub const BAD_IDENTITY_TOKEN_REJECTED: StatusCode = StatusCode(0x8021_0000);
    pub const BAD_SECURE_CHANNEL_ID_INVALID: StatusCode = StatusCode(0x8022_0000);
    pub const BAD_INVALID_TIMESTAMP: StatusCode = StatusCode(0x8023_0000);
    pub const BAD_NONCE_INVALID: StatusCode = StatusCode(0x8024_0000);
    pub const BAD_SESSION_ID_INVALID: StatusCode = StatusCode(0x8025_0000);
    pub const BAD_SESSION_CLOSED: StatusCode = StatusCode(0x8026_0000);
    pub const BAD_SESSION_NOT_ACTIVATED: StatusCode = StatusCode(0x8027_0000);
    pub const BAD_SUBSCRIPTION_ID_INVALID: StatusCode = StatusCode(0x8028_0000);
    pub const BAD_REQUEST_HEADER_INVALID: StatusCode = StatusCode(0x802A_0000);
    pub const BAD_TIMESTAMPS_TO_RETURN_INVALID: StatusCode = StatusCode(0x802B_0000);
    pub const BAD_REQUEST_CANCELLED_BY_CLIENT: StatusCode = StatusCode(0x802C_0000);
    pub const BAD_NO_COMMUNICATION: StatusCode = StatusCode(0x8031_0000);
    pub const BAD_NODE_ID_INVALID: StatusCode = StatusCode(0x8033_0000);
    pub const BAD_NODE_ID_UNKNOWN: StatusCode = StatusCode(0x8034_0000);
    pub const BAD_ATTRIBUTE_ID_INVALID: StatusCode = StatusCode(0x8035_0000);
    pub const BAD_INDEX_RANGE_INVALID: StatusCode = StatusCode(0x8036_0000);
    pub const BAD_DATA_ENCODING_INVALID: StatusCode = StatusCode(0x8038_0000);
    pub const BAD_NOT_READABLE: StatusCode = StatusCode(0x803A_0000);
    pub const BAD_NOT_WRITABLE: StatusCode = StatusCode(0x803B_0000);
    pub const BAD_NOT_SUPPORTED: StatusCode = StatusCode(0x803D_0000);
    pub const BAD_NOT_FOUND: StatusCode = StatusCode(0x803E_0000);
    pub const BAD_NO_CONTINUATION_POINTS: StatusCode = StatusCode(0x804B_0000);
    pub const BAD_CONTINUATION_POINT_INVALID: StatusCode = StatusCode(0x804A_0000);
    pub const BAD_BROWSE_DIRECTION_INVALID: StatusCode = StatusCode(0x804D_0000);
    pub const BAD_TOO_MANY_PUBLISH_REQUESTS: StatusCode = StatusCode(0x806D_0000);
    pub const BAD_NO_SUBSCRIPTION: StatusCode = StatusCode(0x8079_0000);
    pub const BAD_SEQUENCE_NUMBER_UNKNOWN: StatusCode = StatusCode(0x807A_0000);
    pub const BAD_TCP_SERVER_TOO_BUSY: StatusCode = StatusCode(0x807D_0000);
    pub const BAD_TCP_MESSAGE_TYPE_INVALID: StatusCode = StatusCode(0x807E_0000);
    pub const BAD_TCP_SECURE_CHANNEL_UNKNOWN: StatusCode = StatusCode(0x807F_0000);
    pub const BAD_TCP_MESSAGE_TOO_LARGE: StatusCode = StatusCode(0x8080_0000);
    pub const BAD_TCP_ENDPOINT_URL_INVALID: StatusCode = StatusCode(0x8083_0000);
    pub const BAD_SECURE_CHANNEL_CLOSED: StatusCode = StatusCode(0x8086_0000);
    pub const BAD_SECURE_CHANNEL_TOKEN_UNKNOWN: StatusCode = StatusCode(0x8087_0000);
    pub const BAD_SEQUENCE_NUMBER_INVALID: StatusCode = StatusCode(0x8088_0000);
    pub const BAD_CONNECTION_CLOSED: StatusCode = StatusCode(0x80AE_0000);
    pub const BAD_INVALID_ARGUMENT: StatusCode = StatusCode(0x80AB_0000);
    pub const BAD_CONNECTION_REJECTED: StatusCode = StatusCode(0x80AC_0000);
    pub const BAD_DISCONNECT: StatusCode = StatusCode(0x80AD_0000);
    pub const UNCERTAIN_INITIAL_VALUE: StatusCode = StatusCode(0x4092_0000);

    /// Top two bits both clear.
    pub fn is_good(&self) -> bool {
        self.0 & 0xC000_0000 == 0
    }

    /// Bit 30 set, bit 31 clear.
    pub fn is_uncertain(&self) -> bool {
        self.0 & 0xC000_0000 == 0x4000_0000
    }

    /// Bit 31 set.
    pub fn is_bad(&self) -> bool {
        self.0 & 0x8000_0000 != 0
    }

    /// The sub-code, bits 16-29.
    pub fn sub_code(&self) -> u16 {
        ((self.0 >> 16) & 0x3FFF) as u16
    }

    /// Symbolic name if the code (ignoring the low 16 flag bits) is known.
    pub fn name(&self) -> Option<&'static str> {
        let name = match self.0 & 0xFFFF_0000 {
            0x0000_0000 => "Good",
            0x8001_0000 => "BadUnexpectedError",
            0x8002_0000 => "BadInternalError",
            0x8003_0000 => "BadOutOfMemory",
            0x8004_0000 => "BadResourceUnavailable",
            0x8005_0000 => "BadCommunicationError",
            0x8006_0000 => "BadEncodingError",
            0x8007_0000 => "BadDecodingError",
            0x8008_0000 => "BadEncodingLimitsExceeded",
            0x800A_0000 => "BadTimeout",
            0x800B_0000 => "BadServiceUnsupported",
            0x800C_0000 => "BadShutdown",
            0x800D_0000 => "BadServerNotConnected",
            0x800F_0000 => "BadNothingToDo",
            0x8010_0000 => "BadTooManyOperations",
            0x8012_0000 => "BadCertificateInvalid",
            0x8013_0000 => "BadSecurityChecksFailed",
            0x801A_0000 => "BadCertificateUntrusted",
            0x801F_0000 => "BadUserAccessDenied",
            0x8020_0000 => "BadIdentityTokenInvalid",
            0x8021_0000 => "BadIdentityTokenRejected",
            0x8022_0000 => "BadSecureChannelIdInvalid",
            0x8023_0000 => "BadInvalidTimestamp",
            0x8024_0000 => "BadNonceInvalid",
            0x8025_0000 => "BadSessionIdInvalid",
            0x8026_0000 => "BadSessionClosed",
            0x8027_0000 => "BadSessionNotActivated",
            0x8028_0000 => "BadSubscriptionIdInvalid",
            0x802A_0000 => "BadRequestHeaderInvalid",
            0x802B_0000 => "BadTimestampsToReturnInvalid",
            0x802C_0000 => "BadRequestCancelledByClient",
            0x8031_0000 => "BadNoCommunication",
            0x8033_0000 => "BadNodeIdInvalid",
            0x8034_0000 => "BadNodeIdUnknown",
            0x8035_0000 => "BadAttributeIdInvalid",
            0x8036_0000 => "BadIndexRangeInvalid",
            0x8038_0000 => "BadDataEncodingInvalid",
            0x803A_0000 => "BadNotReadable",
            0x803B_0000 => "BadNotWritable",
            0x803D_0000 => "BadNotSupported",
            0x803E_0000 => "BadNotFound",
            0x804A_0000 => "BadContinuationPointInvalid",
            0x804B_0000 => "BadNoContinuationPoints",
            0x804D_0000 => "BadBrowseDirectionInvalid",
            0x806D_0000 => "BadTooManyPublishRequests",
            0x8079_0000 => "BadNoSubscription",
            0x807A_0000 => "BadSequenceNumberUnknown",
            0x807D_0000 => "BadTcpServerTooBusy",
            0x807E_0000 => "BadTcpMessageTypeInvalid",
            0x807F_0000 => "BadTcpSecureChannelUnknown",
            0x8080_0000 => "BadTcpMessageTooLarge",
            0x8083_0000 => "BadTcpEndpointUrlInvalid",
            0x8086_0000 => "BadSecureChannelClosed",
            0x8087_0000 => "BadSecureChannelTokenUnknown",
            0x8088_0000 => "BadSequenceNumberInvalid",
            0x80AB_0000 => "BadInvalidArgument",
            0x80AC_0000 => "BadConnectionRejected",
            0x80AD_0000 => "BadDisconnect",
            0x80AE_0000 => "BadConnectionClosed",
            0x4092_0000 => "UncertainInitialValue",
            _ => return None,
        };
        Some(name)
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.name() {
            Some(name) => write!(f, "0x{:08X} ({})", self.0, name),
            None => write!(f, "0x{:08X}", self.0),
        }
    }
}

impl From<u32> for StatusCode {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl BinaryEncode for StatusCode {
    fn encode(&self, out: &mut Vec<u8>) {
        self.0.encode(out);
    }
}

impl BinaryDecode for StatusCode {
    fn decode(stream: &mut &[u8]) -> EncodingResult<Self> {
        Ok(Self(u32::decode(stream)?))
    }
}
