//! printf-style formatting into a [`CowString`].
//!
//! Supported: flags `- + space # 0 ~` (`~` is accepted and ignored), width,
//! `.precision`, length modifiers `h`, `l` and `ll`, and the conversions
//! `c d i o u x X e E f g G s p`, plus `%%`. Arguments are passed as a
//! slice of [`FormatArg`]; the [`cow_format!`](crate::cow_format) macro
//! builds it.
//!
//! Floating conversions strip trailing zeros from the mantissa and then a
//! bare decimal point, so `%.2f` of `1.0` is `1`. The `#` flag turns that
//! off and always keeps the point: `%#.0f` of `100.0` is `100.`. Without a length
//! modifier integers are truncated to 32 bits and `h` truncates to 16, as
//! C's integer promotions would.

use crate::cow_string::CowString;
use tracing::warn;

/// Largest accepted width or precision.
pub const MAX_FIELD: usize = 4000;

/// Longest run of flag, width and precision characters in one conversion.
pub const MAX_SPEC: usize = 123;

const OPTION_BYTES: &[u8] = b" #+-~.0123456789";
const CONVERSIONS: &[u8] = b"cdiouxXeEfgGsp";

/// One formatting argument.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum FormatArg<'a> {
    Char(char),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(&'a [u8]),
    Ptr(usize),
}

/// Why a format string could not be fully rendered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("conversion at byte {at} has more than {} flag, width and precision characters", MAX_SPEC)]
    SpecTooLong { at: usize },
    #[error("width or precision {value} exceeds {}", MAX_FIELD)]
    FieldTooLarge { value: usize },
    #[error("unsupported conversion `{spec}` at byte {at}")]
    Unsupported { at: usize, spec: String },
    #[error("unknown conversion character {conv:?} at byte {at}")]
    UnknownConversion { at: usize, conv: char },
    #[error("format ends inside the conversion at byte {at}")]
    Incomplete { at: usize },
    #[error("no argument for conversion {index}")]
    MissingArgument { index: usize },
    #[error("argument {index} cannot be formatted with %{conv}")]
    ArgumentMismatch { index: usize, conv: char },
}

macro_rules! arg_from {
    ($variant:ident, $target:ty: $($t:ty),*) => {$(
        impl From<$t> for FormatArg<'_> {
            #[inline]
            fn from(v: $t) -> Self {
                FormatArg::$variant(v as $target)
            }
        }
    )*};
}

arg_from!(Int, i64: i8, i16, i32, i64, isize);
arg_from!(UInt, u64: u8, u16, u32, u64, usize);
arg_from!(Float, f64: f32, f64);

impl From<bool> for FormatArg<'_> {
    fn from(v: bool) -> Self {
        FormatArg::Int(v as i64)
    }
}

impl From<char> for FormatArg<'_> {
    fn from(v: char) -> Self {
        FormatArg::Char(v)
    }
}

impl<'a> From<&'a str> for FormatArg<'a> {
    fn from(v: &'a str) -> Self {
        FormatArg::Str(v.as_bytes())
    }
}

impl<'a> From<&'a String> for FormatArg<'a> {
    fn from(v: &'a String) -> Self {
        FormatArg::Str(v.as_bytes())
    }
}

impl<'a> From<&'a [u8]> for FormatArg<'a> {
    fn from(v: &'a [u8]) -> Self {
        FormatArg::Str(v)
    }
}

impl<'a> From<&'a CowString> for FormatArg<'a> {
    fn from(v: &'a CowString) -> Self {
        FormatArg::Str(v.as_bytes())
    }
}

impl<T> From<*const T> for FormatArg<'_> {
    fn from(v: *const T) -> Self {
        FormatArg::Ptr(v as usize)
    }
}

impl<T> From<*mut T> for FormatArg<'_> {
    fn from(v: *mut T) -> Self {
        FormatArg::Ptr(v as usize)
    }
}

/// Format into a new [`CowString`]: `cow_format!("%d-%s", 5, "x")`.
#[macro_export]
macro_rules! cow_format {
    ($fmt:expr $(, $arg:expr)* $(,)?) => {
        $crate::CowString::format($fmt, &[$($crate::FormatArg::from($arg)),*])
    };
}

#[derive(Copy, Clone, Default, Debug)]
struct Spec {
    left: bool,
    plus: bool,
    space: bool,
    alt: bool,
    zero: bool,
    width: usize,
    precision: Option<usize>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Length {
    Default,
    Short,
    Long,
    LongLong,
}

fn parse_number(bytes: &[u8]) -> Result<(usize, usize), FormatError> {
    let digits = bytes.iter().take_while(|b| b.is_ascii_digit()).count();
    let value = bytes[..digits].iter().fold(0usize, |acc, &b| {
        acc.saturating_mul(10).saturating_add((b - b'0') as usize)
    });
    if value > MAX_FIELD {
        return Err(FormatError::FieldTooLarge { value });
    }
    Ok((value, digits))
}

fn parse_spec(run: &[u8], at: usize, fmt: &[u8]) -> Result<Spec, FormatError> {
    let mut spec = Spec::default();
    let mut i = 0;
    while let Some(&b) = run.get(i) {
        match b {
            b'-' => spec.left = true,
            b'+' => spec.plus = true,
            b' ' => spec.space = true,
            b'#' => spec.alt = true,
            b'0' => spec.zero = true,
            b'~' => {}
            _ => break,
        }
        i += 1;
    }
    let (width, n) = parse_number(&run[i..])?;
    spec.width = width;
    i += n;
    if run.get(i) == Some(&b'.') {
        i += 1;
        let (precision, n) = parse_number(&run[i..])?;
        spec.precision = Some(precision);
        i += n;
    }
    if i != run.len() {
        // Flags after the width, a second precision, and so on.
        let end = (at + 1 + run.len() + 1).min(fmt.len());
        return Err(FormatError::Unsupported {
            at,
            spec: String::from_utf8_lossy(&fmt[at..end]).into_owned(),
        });
    }
    Ok(spec)
}

fn pad(out: &mut CowString, spec: &Spec, head: &[u8], body: &[u8], zero_ok: bool) {
    let fill = spec.width.saturating_sub(head.len() + body.len());
    if spec.left {
        out.append(head);
        out.append(body);
        out.append_repeat(fill, b' ');
    } else if zero_ok && spec.zero {
        out.append(head);
        out.append_repeat(fill, b'0');
        out.append(body);
    } else {
        out.append_repeat(fill, b' ');
        out.append(head);
        out.append(body);
    }
}

fn write_integer(out: &mut CowString, spec: &Spec, sign: &str, prefix: &str, digits: String) {
    let mut digits = digits;
    if let Some(p) = spec.precision {
        if p == 0 && digits == "0" {
            digits.clear();
        }
        if digits.len() < p {
            digits.insert_str(0, &"0".repeat(p - digits.len()));
        }
    }
    let head = format!("{sign}{prefix}");
    pad(out, spec, head.as_bytes(), digits.as_bytes(), spec.precision.is_none());
}

fn sign_of(spec: &Spec, negative: bool) -> &'static str {
    if negative {
        "-"
    } else if spec.plus {
        "+"
    } else if spec.space {
        " "
    } else {
        ""
    }
}

/// `d.ddde±XX` with at least two exponent digits.
fn exponent_form(a: f64, precision: usize, upper: bool) -> String {
    let s = format!("{:.*e}", precision, a);
    let (mantissa, exp) = s.split_once('e').unwrap_or((s.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    let e = if upper { 'E' } else { 'e' };
    let sign = if exp < 0 { '-' } else { '+' };
    format!("{mantissa}{e}{sign}{:02}", exp.abs())
}

fn decimal_exponent(a: f64, precision: usize) -> i32 {
    if a == 0.0 {
        return 0;
    }
    let s = format!("{:.*e}", precision, a);
    s.split_once('e')
        .and_then(|(_, exp)| exp.parse().ok())
        .unwrap_or(0)
}

fn general_form(a: f64, precision: usize, upper: bool) -> String {
    let p = precision.max(1);
    let x = decimal_exponent(a, p - 1);
    if (p as i32) > x && x >= -4 {
        format!("{:.*}", (p as i32 - 1 - x) as usize, a)
    } else {
        exponent_form(a, p - 1, upper)
    }
}

/// Drop trailing zeros of the mantissa, then a bare point.
fn strip_zeros(body: &mut String) {
    let split = body.find(|c| c == 'e' || c == 'E').unwrap_or(body.len());
    let (mantissa, exponent) = body.split_at(split);
    if !mantissa.contains('.') {
        return;
    }
    let trimmed = mantissa.trim_end_matches('0').trim_end_matches('.');
    *body = format!("{trimmed}{exponent}");
}

/// `#` form: the mantissa always carries a decimal point.
fn keep_point(body: &mut String) {
    let split = body.find(|c| c == 'e' || c == 'E').unwrap_or(body.len());
    if !body[..split].contains('.') {
        body.insert(split, '.');
    }
}

fn write_float(out: &mut CowString, spec: &Spec, conv: u8, v: f64) {
    let upper = conv.is_ascii_uppercase();
    let sign = sign_of(spec, v.is_sign_negative() && !v.is_nan());
    if !v.is_finite() {
        let text = match (v.is_nan(), upper) {
            (true, false) => "nan",
            (true, true) => "NAN",
            (false, false) => "inf",
            (false, true) => "INF",
        };
        pad(out, spec, sign.as_bytes(), text.as_bytes(), false);
        return;
    }
    let a = v.abs();
    let precision = spec.precision.unwrap_or(6);
    let mut body = match conv {
        b'e' | b'E' => exponent_form(a, precision, upper),
        b'g' | b'G' => general_form(a, precision, upper),
        _ => format!("{:.*}", precision, a),
    };
    if spec.alt {
        keep_point(&mut body);
    } else {
        strip_zeros(&mut body);
    }
    pad(out, spec, sign.as_bytes(), body.as_bytes(), true);
}

fn write_conversion(
    out: &mut CowString,
    spec: &Spec,
    length: Length,
    conv: u8,
    arg: &FormatArg<'_>,
    index: usize,
) -> Result<(), FormatError> {
    let mismatch = || FormatError::ArgumentMismatch {
        index,
        conv: conv as char,
    };
    match conv {
        b'c' => {
            let mut utf8 = [0u8; 4];
            let body: &[u8] = match *arg {
                FormatArg::Char(c) => c.encode_utf8(&mut utf8).as_bytes(),
                FormatArg::Int(v) => {
                    utf8[0] = v as u8;
                    &utf8[..1]
                }
                FormatArg::UInt(v) => {
                    utf8[0] = v as u8;
                    &utf8[..1]
                }
                _ => return Err(mismatch()),
            };
            pad(out, spec, b"", body, false);
        }
        b'd' | b'i' => {
            let v = match *arg {
                FormatArg::Int(v) => v,
                FormatArg::UInt(v) => v as i64,
                FormatArg::Char(c) => c as i64,
                _ => return Err(mismatch()),
            };
            let v = match length {
                Length::Default => v as i32 as i64,
                Length::Short => v as i16 as i64,
                Length::Long | Length::LongLong => v,
            };
            let sign = sign_of(spec, v < 0);
            write_integer(out, spec, sign, "", v.unsigned_abs().to_string());
        }
        b'o' | b'u' | b'x' | b'X' => {
            let v = match *arg {
                FormatArg::Int(v) => v as u64,
                FormatArg::UInt(v) => v,
                FormatArg::Char(c) => c as u64,
                _ => return Err(mismatch()),
            };
            let v = match length {
                Length::Default => v as u32 as u64,
                Length::Short => v as u16 as u64,
                Length::Long | Length::LongLong => v,
            };
            let (prefix, digits) = match conv {
                b'o' => {
                    let digits = format!("{v:o}");
                    let prefix = if spec.alt && spec.precision.map_or(true, |p| p <= digits.len()) && v != 0 {
                        "0"
                    } else {
                        ""
                    };
                    (prefix, digits)
                }
                b'x' => (if spec.alt && v != 0 { "0x" } else { "" }, format!("{v:x}")),
                b'X' => (if spec.alt && v != 0 { "0X" } else { "" }, format!("{v:X}")),
                _ => ("", v.to_string()),
            };
            write_integer(out, spec, "", prefix, digits);
        }
        b'e' | b'E' | b'f' | b'g' | b'G' => {
            let FormatArg::Float(v) = *arg else {
                return Err(mismatch());
            };
            write_float(out, spec, conv, v);
        }
        b's' => {
            let FormatArg::Str(bytes) = *arg else {
                return Err(mismatch());
            };
            let body = match spec.precision {
                Some(p) => &bytes[..p.min(bytes.len())],
                None => bytes,
            };
            pad(out, spec, b"", body, false);
        }
        b'p' => {
            let FormatArg::Ptr(addr) = *arg else {
                return Err(mismatch());
            };
            pad(out, spec, b"", format!("{addr:#x}").as_bytes(), false);
        }
        // format_into rejects every byte outside CONVERSIONS.
        _ => unreachable!("conversion {:?} passed the conversion check", conv as char),
    }
    Ok(())
}

/// Render `fmt` into `out`, stopping at the first error.
fn format_into(out: &mut CowString, fmt: &[u8], args: &[FormatArg<'_>]) -> Result<(), FormatError> {
    let mut i = 0;
    let mut next_arg = 0;
    while i < fmt.len() {
        let Some(offset) = fmt[i..].iter().position(|&b| b == b'%') else {
            out.append(&fmt[i..]);
            break;
        };
        out.append(&fmt[i..i + offset]);
        let at = i + offset;
        i = at + 1;
        if fmt.get(i) == Some(&b'%') {
            out.push(b'%');
            i += 1;
            continue;
        }

        let run = fmt[i..]
            .iter()
            .take_while(|b| OPTION_BYTES.contains(b))
            .count();
        if run > MAX_SPEC {
            return Err(FormatError::SpecTooLong { at });
        }
        let spec = parse_spec(&fmt[i..i + run], at, fmt)?;
        i += run;

        let length = match fmt.get(i) {
            Some(b'h') => {
                i += 1;
                Length::Short
            }
            Some(b'l') if fmt.get(i + 1) == Some(&b'l') => {
                i += 2;
                Length::LongLong
            }
            Some(b'l') => {
                i += 1;
                Length::Long
            }
            Some(b'L') => {
                let end = (i + 2).min(fmt.len());
                return Err(FormatError::Unsupported {
                    at,
                    spec: String::from_utf8_lossy(&fmt[at..end]).into_owned(),
                });
            }
            _ => Length::Default,
        };

        let Some(&conv) = fmt.get(i) else {
            return Err(FormatError::Incomplete { at });
        };
        i += 1;
        if !CONVERSIONS.contains(&conv) {
            return Err(FormatError::UnknownConversion {
                at,
                conv: conv as char,
            });
        }
        let Some(arg) = args.get(next_arg) else {
            return Err(FormatError::MissingArgument { index: next_arg });
        };
        write_conversion(out, &spec, length, conv, arg, next_arg)?;
        next_arg += 1;
    }
    Ok(())
}

impl CowString {
    /// Render `fmt` with `args`. Surplus arguments are ignored.
    pub fn try_format(fmt: &str, args: &[FormatArg<'_>]) -> Result<CowString, FormatError> {
        let mut out = CowString::new();
        format_into(&mut out, fmt.as_bytes(), args)?;
        Ok(out)
    }

    /// Like [`try_format`](Self::try_format), but on error logs a warning
    /// and returns the text produced before the failing conversion.
    pub fn format(fmt: &str, args: &[FormatArg<'_>]) -> CowString {
        let mut out = CowString::new();
        if let Err(err) = format_into(&mut out, fmt.as_bytes(), args) {
            warn!(%err, fmt, "format stopped early");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f(fmt: &str, args: &[FormatArg<'_>]) -> String {
        match CowString::try_format(fmt, args) {
            Ok(s) => s.to_string(),
            Err(e) => panic!("{fmt:?}: {e}"),
        }
    }

    #[test]
    fn integers() {
        assert_eq!(f("%d-%s", &[5.into(), "x".into()]), "5-x");
        assert_eq!(f("%5d|%-5d|%05d", &[42.into(), 42.into(), (-42).into()]), "   42|42   |-0042");
        assert_eq!(f("%+d % d", &[7.into(), 7.into()]), "+7  7");
        assert_eq!(f("%.3d", &[7.into()]), "007");
        assert_eq!(f("%.0d|", &[0.into()]), "|");
        assert_eq!(f("%x %X %#x %o %#o", &[255.into(), 255.into(), 255.into(), 8.into(), 8.into()]), "ff FF 0xff 10 010");
        assert_eq!(f("%u", &[(-1).into()]), "4294967295");
        assert_eq!(f("%lu", &[(-1i64).into()]), "18446744073709551615");
        assert_eq!(f("%hd", &[65537.into()]), "1");
        assert_eq!(f("%lld", &[i64::MIN.into()]), "-9223372036854775808");
        assert_eq!(f("%d", &[(1u64 << 32 | 3).into()]), "3");
    }

    /// Invariant: float output has no trailing zeros or bare point.
    #[test]
    fn floats_strip_trailing_zeros() {
        assert_eq!(f("%.2f", &[1.0.into()]), "1");
        assert_eq!(f("%.2f", &[1.25.into()]), "1.25");
        assert_eq!(f("%f", &[1.5.into()]), "1.5");
        assert_eq!(f("%.0f", &[100.0.into()]), "100");
        assert_eq!(f("%f", &[(-0.125).into()]), "-0.125");
        assert_eq!(f("%e", &[150.0.into()]), "1.5e+02");
        assert_eq!(f("%E", &[0.00025.into()]), "2.5E-04");
        assert_eq!(f("%g", &[0.0001.into()]), "0.0001");
        assert_eq!(f("%g", &[1234567.0.into()]), "1.23457e+06");
        assert_eq!(f("%g", &[100.0.into()]), "100");
        assert_eq!(f("%8.3f|", &[3.14159.into()]), "   3.142|");
        assert_eq!(f("%08.2f", &[(-2.5).into()]), "-00002.5");
        assert_eq!(f("%+.1f", &[2.0.into()]), "+2");
        assert_eq!(f("%f %G %f", &[f64::INFINITY.into(), f64::NAN.into(), f64::NEG_INFINITY.into()]), "inf NAN -inf");
    }

    /// Invariant: `#` keeps the decimal point and every trailing zero.
    #[test]
    fn alt_float_keeps_point() {
        assert_eq!(f("%#.0f", &[100.0.into()]), "100.");
        assert_eq!(f("%#.2f", &[1.0.into()]), "1.00");
        assert_eq!(f("%#.0e", &[300.0.into()]), "3.e+02");
        assert_eq!(f("%#g", &[100.0.into()]), "100.000");
        assert_eq!(f("%#6.0f|", &[(-7.0).into()]), "   -7.|");
        assert_eq!(f("%#f", &[f64::INFINITY.into()]), "inf");
    }

    #[test]
    fn strings_chars_and_pointers() {
        assert_eq!(f("[%5s][%-5s][%.2s]", &["ab".into(), "ab".into(), "abc".into()]), "[   ab][ab   ][ab]");
        assert_eq!(f("%c%c%3c", &['o'.into(), 107.into(), 'x'.into()]), "ok  x");
        assert_eq!(f("%p", &[(0x1000usize as *const u8).into()]), "0x1000");
        assert_eq!(f("100%% %s", &[(&CowString::from("done")).into()]), "100% done");
        assert_eq!(f("no conversions", &[]), "no conversions");
        assert_eq!(f("%~d", &[3.into()]), "3");
    }

    #[test]
    fn errors_are_reported() {
        assert_eq!(CowString::try_format("%d %d", &[1.into()]), Err(FormatError::MissingArgument { index: 1 }));
        assert_eq!(
            CowString::try_format("%s", &[1.into()]),
            Err(FormatError::ArgumentMismatch { index: 0, conv: 's' })
        );
        assert!(matches!(CowString::try_format("%Lf", &[1.0.into()]), Err(FormatError::Unsupported { .. })));
        assert!(matches!(CowString::try_format("%5-d", &[1.into()]), Err(FormatError::Unsupported { .. })));
        assert_eq!(CowString::try_format("%4001d", &[1.into()]), Err(FormatError::FieldTooLarge { value: 4001 }));
        assert_eq!(CowString::try_format("ab%", &[]), Err(FormatError::Incomplete { at: 2 }));
        assert_eq!(
            CowString::try_format("%q", &[]),
            Err(FormatError::UnknownConversion { at: 0, conv: 'q' })
        );
        assert_eq!(
            CowString::try_format("x%-5ly", &[1.into()]),
            Err(FormatError::UnknownConversion { at: 1, conv: 'y' }),
            "rejected before any argument is consumed"
        );
        let long = format!("%{}d", "-".repeat(MAX_SPEC + 1));
        assert_eq!(CowString::try_format(&long, &[1.into()]), Err(FormatError::SpecTooLong { at: 0 }));
    }

    #[test]
    fn lossy_format_keeps_prefix() {
        let s = CowString::format("a=%d b=%q c=%d", &[1.into(), 2.into()]);
        assert_eq!(s, "a=1 b=");
    }

    #[test]
    fn macro_builds_arguments() {
        let name = String::from("x");
        let s = crate::cow_format!("%d-%s-%.1f", 5, &name, 0.5);
        assert_eq!(s, "5-x-0.5");
    }
}
