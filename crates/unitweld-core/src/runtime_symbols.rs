//! Hosted C runtime symbols.
//!
//! Every test binary links against the hosted C runtime, so references to
//! these names are always satisfiable without a mock or collaborator. The
//! policy engine filters them out of the decision set and reports them
//! separately on the link plan. The table is curated, not exhaustive: a
//! runtime symbol missing here simply shows up as IntentionallyUnresolved
//! and costs the author an explicit tolerance flag, never a wrong build.
//!
//! `assert` is listed even though it is a macro: the scanner works on
//! unpreprocessed source, where an assert expands to nothing yet and scans
//! as a call.

/// Sorted table of symbol names the hosted runtime provides.
const RUNTIME_SYMBOLS: &[&str] = &[
    "__assert_fail",
    "_exit",
    "abort",
    "abs",
    "asprintf",
    "assert",
    "atexit",
    "atof",
    "atoi",
    "atol",
    "atoll",
    "basename",
    "bsearch",
    "calloc",
    "ceil",
    "clock",
    "close",
    "cos",
    "exit",
    "exp",
    "fabs",
    "fclose",
    "feof",
    "ferror",
    "fflush",
    "fgetc",
    "fgets",
    "floor",
    "fopen",
    "fork",
    "fprintf",
    "fputc",
    "fputs",
    "fread",
    "free",
    "fscanf",
    "fseek",
    "ftell",
    "fwrite",
    "getc",
    "getchar",
    "getenv",
    "gets",
    "gettimeofday",
    "isalnum",
    "isalpha",
    "isdigit",
    "islower",
    "isspace",
    "isupper",
    "log",
    "log10",
    "longjmp",
    "malloc",
    "memchr",
    "memcmp",
    "memcpy",
    "memmove",
    "memset",
    "open",
    "perror",
    "pow",
    "printf",
    "putc",
    "putchar",
    "puts",
    "qsort",
    "rand",
    "read",
    "realloc",
    "rewind",
    "scanf",
    "setjmp",
    "sin",
    "snprintf",
    "sprintf",
    "sqrt",
    "srand",
    "sscanf",
    "stderr",
    "stdin",
    "stdout",
    "strcasecmp",
    "strcat",
    "strchr",
    "strcmp",
    "strcpy",
    "strcspn",
    "strdup",
    "strerror",
    "strlen",
    "strncasecmp",
    "strncat",
    "strncmp",
    "strncpy",
    "strndup",
    "strrchr",
    "strspn",
    "strstr",
    "strtod",
    "strtok",
    "strtol",
    "strtoll",
    "strtoul",
    "strtoull",
    "tan",
    "time",
    "tolower",
    "toupper",
    "ungetc",
    "unlink",
    "usleep",
    "vfprintf",
    "vprintf",
    "vsnprintf",
    "vsprintf",
    "write",
];

/// True when the hosted runtime is expected to satisfy this reference.
#[must_use]
pub fn is_runtime_symbol(name: &str) -> bool {
    RUNTIME_SYMBOLS.binary_search(&name).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_sorted_and_deduped() {
        for pair in RUNTIME_SYMBOLS.windows(2) {
            assert!(pair[0] < pair[1], "{} !< {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn classifies_common_names() {
        assert!(is_runtime_symbol("printf"));
        assert!(is_runtime_symbol("abort"));
        assert!(is_runtime_symbol("basename"));
        assert!(!is_runtime_symbol("database_id_exists"));
        assert!(!is_runtime_symbol("function_somewhere_else"));
    }
}
