use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::CommandError;

use strum_macros::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum DataType {
    #[strum(serialize = "A")]
    ASCII(DataFormat),
    #[strum(serialize = "E")]
    EBCDIC(DataFormat),
    #[strum(serialize = "I")]
    Image,
    #[strum(serialize = "L")]
    Local(u8),
}

impl Default for DataType {
    fn default() -> Self {
        DataType::ASCII(DataFormat::default())
    }
}

impl DataType {
    /// Parses `A|E [N|T|C]`, `I` or `L <byte-size>`.
    pub fn parse_args(args: &[&str]) -> Result<DataType, CommandError> {
        let (data_type, arg) = match args {
            [data_type] => (*data_type, None),
            [data_type, arg] => (*data_type, Some(*arg)),
            [] => return Err(CommandError::MissingParam("type")),
            _ => return Err(CommandError::TooManyParams(2)),
        };
        let bad_arg = |arg: &str| CommandError::BadParam(arg.to_owned());
        let data_type = DataType::from_str(data_type).map_err(|_| bad_arg(data_type))?;
        let data_type = match data_type {
            DataType::ASCII(_) | DataType::EBCDIC(_) => {
                let data_format: DataFormat = match arg {
                    Some(data_format) => data_format.parse().map_err(|_| bad_arg(data_format))?,
                    None => DataFormat::default(),
                };
                match data_type {
                    DataType::ASCII(_) => DataType::ASCII(data_format),
                    _ => DataType::EBCDIC(data_format),
                }
            }
            DataType::Image => match arg {
                Some(arg) => return Err(bad_arg(arg)),
                None => DataType::Image,
            },
            DataType::Local(_) => {
                let arg = arg.ok_or(CommandError::MissingParam("type L"))?;
                let byte_size: u8 = arg.parse().map_err(|_| bad_arg(arg))?;
                if byte_size == 0 {
                    return Err(bad_arg(arg));
                }
                DataType::Local(byte_size)
            }
        };
        Ok(data_type)
    }

    /// Argument of the `TYPE` request.
    pub fn argument(&self) -> String {
        match self {
            DataType::ASCII(format) | DataType::EBCDIC(format) => format!("{} {}", self, format),
            DataType::Image => self.to_string(),
            DataType::Local(byte_size) => format!("{} {}", self, byte_size),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum DataFormat {
    #[strum(serialize = "N")]
    NonPrint,
    #[strum(serialize = "T")]
    TelnetFormatEffectors,
    #[strum(serialize = "C")]
    CarriageControl,
}

impl Default for DataFormat {
    fn default() -> Self {
        Self::NonPrint
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum DataStructure {
    #[strum(serialize = "F")]
    FileStructure,
    #[strum(serialize = "R")]
    RecordStructure,
    #[strum(serialize = "P")]
    PageStructure,
}

impl Default for DataStructure {
    fn default() -> Self {
        DataStructure::FileStructure
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum TransferMode {
    #[strum(serialize = "S")]
    Stream,
    #[strum(serialize = "B")]
    Block,
    #[strum(serialize = "C")]
    Compressed,
}

impl Default for TransferMode {
    fn default() -> Self {
        TransferMode::Stream
    }
}

/// Representation settings for a data transfer. `None` leaves the server's
/// default in place and is never negotiated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferParams {
    pub data_type: Option<DataType>,
    pub transfer_mode: Option<TransferMode>,
    pub data_structure: Option<DataStructure>,
}

impl Display for TransferParams {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        fn or_default<T: ToString>(value: Option<T>) -> String {
            value.map_or_else(|| "default".to_owned(), |value| value.to_string())
        }
        write!(
            f,
            "type={} mode={} stru={}",
            or_default(self.data_type.map(|data_type| data_type.argument())),
            or_default(self.transfer_mode),
            or_default(self.data_structure)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_arguments() {
        assert_eq!(DataType::parse_args(&["i"]), Ok(DataType::Image));
        assert_eq!(
            DataType::parse_args(&["A", "T"]),
            Ok(DataType::ASCII(DataFormat::TelnetFormatEffectors))
        );
        assert_eq!(DataType::parse_args(&["L", "8"]), Ok(DataType::Local(8)));
        assert_eq!(
            DataType::parse_args(&["L"]),
            Err(CommandError::MissingParam("type L"))
        );
        assert_eq!(
            DataType::parse_args(&["X"]),
            Err(CommandError::BadParam("X".to_owned()))
        );
        assert_eq!(
            DataType::parse_args(&["I", "N"]),
            Err(CommandError::BadParam("N".to_owned()))
        );
    }

    #[test]
    fn test_type_request_arguments() {
        assert_eq!(DataType::default().argument(), "A N");
        assert_eq!(DataType::Image.argument(), "I");
        assert_eq!(DataType::Local(8).argument(), "L 8");
        assert_eq!(DataType::EBCDIC(DataFormat::CarriageControl).argument(), "E C");
    }

    #[test]
    fn test_params_display() {
        let params = TransferParams {
            data_type: Some(DataType::Image),
            transfer_mode: Some(TransferMode::Stream),
            data_structure: None,
        };
        assert_eq!(params.to_string(), "type=I mode=S stru=default");
        assert_eq!("b".parse(), Ok(TransferMode::Block));
        assert_eq!("R".parse(), Ok(DataStructure::RecordStructure));
    }
}
