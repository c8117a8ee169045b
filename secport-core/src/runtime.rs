//! Static per-language runtime profiles.
//!
//! Each supported language maps to a base runtime, the tools to install, the
//! trailing build-file instructions that run its analyzers, and the host
//! tooling provisioned into the portability VM. The table is the single
//! source of truth for both instruction synthesis and target discovery.

use std::fmt;

/// Marker prefix for the "declare working directory" instruction. A trailing
/// instruction carrying it is immediately followed by a synthesized
/// copy-sources instruction during toolset synthesis.
pub const WORKDIR_MARKER: &str = "WORKDIR ";

/// A language with a supported isolated build/test environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Language {
    C,
    Cpp,
    CSharp,
    Go,
    Haskell,
    Java,
    JavaScript,
    Kotlin,
    Lua,
    OCaml,
    OpenCl,
    Php,
    Prolog,
    Python,
    R,
    Ruby,
    Rust,
    Scala,
    Shell,
    Smalltalk,
    Sql,
}

/// Static description of a language's environment: base runtime, tools and
/// trailing setup instructions. Immutable after creation.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeProfile {
    /// Source-file extensions that identify the language.
    pub extensions: &'static [&'static str],
    /// Base runtime identifier; `None` means the language has no container
    /// environment and is tested in a VM only.
    pub runtime: Option<&'static str>,
    /// OS-level tools installed through the image's package manager,
    /// coalesced into one install instruction.
    pub os_tools: &'static [&'static str],
    /// Ecosystem-specific tools as `(name, pinned version)` pairs, installed
    /// through the language package installer or its package manifest.
    pub specific_tools: &'static [(&'static str, Option<&'static str>)],
    /// Free-form trailing instructions appended verbatim after tool setup.
    pub trailing: &'static [&'static str],
    /// Compilers/interpreters provisioned into the portability VM.
    pub host_tools: &'static [&'static str],
    /// Platform-portable languages skip the VM provisioning phase.
    pub portable: bool,
}

impl RuntimeProfile {
    /// The working directory declared by the trailing instructions, if any.
    pub fn workdir(&self) -> Option<&'static str> {
        self.trailing
            .iter()
            .find_map(|line| line.strip_prefix(WORKDIR_MARKER))
            .map(str::trim)
    }
}

impl Language {
    /// Every supported language, in stable order.
    pub const ALL: &'static [Language] = &[
        Language::C,
        Language::Cpp,
        Language::CSharp,
        Language::Go,
        Language::Haskell,
        Language::Java,
        Language::JavaScript,
        Language::Kotlin,
        Language::Lua,
        Language::OCaml,
        Language::OpenCl,
        Language::Php,
        Language::Prolog,
        Language::Python,
        Language::R,
        Language::Ruby,
        Language::Rust,
        Language::Scala,
        Language::Shell,
        Language::Smalltalk,
        Language::Sql,
    ];

    /// Lowercase identifier used in tags and VM names.
    pub fn name(&self) -> &'static str {
        match self {
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::CSharp => "csharp",
            Language::Go => "go",
            Language::Haskell => "haskell",
            Language::Java => "java",
            Language::JavaScript => "javascript",
            Language::Kotlin => "kotlin",
            Language::Lua => "lua",
            Language::OCaml => "ocaml",
            Language::OpenCl => "opencl",
            Language::Php => "php",
            Language::Prolog => "prolog",
            Language::Python => "python",
            Language::R => "r",
            Language::Ruby => "ruby",
            Language::Rust => "rust",
            Language::Scala => "scala",
            Language::Shell => "shell",
            Language::Smalltalk => "smalltalk",
            Language::Sql => "sql",
        }
    }

    /// Find the language owning a source-file extension (without the dot).
    pub fn from_extension(ext: &str) -> Option<Language> {
        Language::ALL
            .iter()
            .copied()
            .find(|lang| lang.profile().extensions.contains(&ext))
    }

    /// The static runtime profile for this language.
    pub fn profile(&self) -> RuntimeProfile {
        match self {
            Language::C => RuntimeProfile {
                extensions: &["c", "h"],
                runtime: Some("ubuntu"),
                os_tools: &["cppcheck"],
                specific_tools: &[],
                trailing: &[
                    "WORKDIR /home/c/app",
                    "RUN cppcheck --enable=all --suppress=missingIncludeSystem . 2> result.txt",
                    "RUN cat result.txt",
                ],
                host_tools: &["gcc"],
                portable: false,
            },
            Language::Cpp => RuntimeProfile {
                extensions: &["cpp", "cxx", "hpp", "hxx"],
                runtime: Some("ubuntu"),
                os_tools: &["cppcheck"],
                specific_tools: &[],
                trailing: &[
                    "WORKDIR /home/cpp/app",
                    "RUN cppcheck --enable=all --suppress=missingIncludeSystem . 2> result.txt",
                ],
                host_tools: &["gcc-c++"],
                portable: false,
            },
            // No official container runtime for the toolchain; VM only.
            Language::CSharp => RuntimeProfile {
                extensions: &["cs"],
                runtime: None,
                os_tools: &[],
                specific_tools: &[],
                trailing: &[],
                host_tools: &["mono"],
                portable: false,
            },
            Language::Go => RuntimeProfile {
                extensions: &["go"],
                runtime: Some("golang"),
                os_tools: &[],
                specific_tools: &[],
                trailing: &[
                    "WORKDIR /go/src/app",
                    "RUN go get -d -v ./...",
                    "RUN go install -v ./...",
                    "RUN go vet ./... 2> result.txt || true",
                ],
                host_tools: &["golang"],
                portable: false,
            },
            Language::Haskell => RuntimeProfile {
                extensions: &["hs"],
                runtime: Some("haskell"),
                os_tools: &["pandoc"],
                specific_tools: &[],
                trailing: &[
                    "RUN cabal update",
                    "RUN cabal install hlint",
                    "WORKDIR /home/haskell/app",
                    "RUN hlint . > result.txt || true",
                ],
                host_tools: &["ghc"],
                portable: false,
            },
            Language::Java => RuntimeProfile {
                extensions: &["java"],
                runtime: Some("java"),
                os_tools: &["checkstyle", "gradle"],
                specific_tools: &[],
                trailing: &[
                    "WORKDIR /home/java/app",
                    "RUN gradle init",
                    "RUN gradle build || true",
                ],
                host_tools: &["java-11-openjdk"],
                portable: false,
            },
            Language::JavaScript => RuntimeProfile {
                extensions: &["js"],
                runtime: Some("node"),
                os_tools: &["git", "gzip"],
                specific_tools: &[
                    ("-g jshint", None),
                    ("eslint --save-dev", None),
                    ("eslint-plugin-import --save-dev", None),
                    ("eslint-plugin-node --save-dev", None),
                    ("eslint-plugin-promise --save-dev", None),
                    ("eslint-plugin-standard --save-dev", None),
                ],
                trailing: &[
                    "WORKDIR /home/javascript/app",
                    "RUN jshint . || true",
                    "RUN npx eslint . > result.txt || true",
                ],
                host_tools: &["nodejs"],
                portable: true,
            },
            Language::Kotlin => RuntimeProfile {
                extensions: &["kt", "kts"],
                runtime: Some("java"),
                os_tools: &["zip", "unzip", "gradle"],
                specific_tools: &[],
                trailing: &[
                    "WORKDIR /home/kotlin/app",
                    "RUN gradle init --dsl kotlin",
                    "RUN gradle build || true",
                ],
                host_tools: &["java-11-openjdk"],
                portable: false,
            },
            Language::Lua => RuntimeProfile {
                extensions: &["lua"],
                runtime: Some("ubuntu"),
                os_tools: &["lua5.3", "luarocks"],
                specific_tools: &[],
                trailing: &[
                    "RUN luarocks install luacheck",
                    "WORKDIR /home/lua/app",
                    "RUN luacheck . > result.txt || true",
                ],
                host_tools: &["lua"],
                portable: true,
            },
            Language::OCaml => RuntimeProfile {
                extensions: &["ml", "mli"],
                runtime: Some("ubuntu"),
                os_tools: &["ocaml"],
                specific_tools: &[],
                trailing: &["WORKDIR /home/ocaml/app"],
                host_tools: &["ocaml"],
                portable: false,
            },
            Language::OpenCl => RuntimeProfile {
                extensions: &["cl"],
                runtime: Some("ubuntu"),
                os_tools: &["ocl-icd-opencl-dev"],
                specific_tools: &[],
                trailing: &["WORKDIR /home/opencl/app"],
                host_tools: &["gcc-c++"],
                portable: false,
            },
            Language::Php => RuntimeProfile {
                extensions: &["php"],
                runtime: Some("php"),
                os_tools: &["zip", "unzip", "libzip-dev", "git"],
                specific_tools: &[
                    ("phpstan/phpstan", Some("^0.12.37")),
                    ("phan/phan", None),
                ],
                trailing: &[
                    "RUN curl -sS https://getcomposer.org/installer | php -- \
                     --install-dir=/usr/local/bin --filename=composer",
                    "WORKDIR /home/php/app",
                    "RUN php /usr/local/bin/composer install",
                    "RUN ./vendor/phan/phan/phan --init || true",
                ],
                host_tools: &["php"],
                portable: true,
            },
            Language::Prolog => RuntimeProfile {
                extensions: &["pl"],
                runtime: Some("swipl"),
                os_tools: &[],
                specific_tools: &[],
                trailing: &[],
                host_tools: &["gprolog"],
                portable: true,
            },
            Language::Python => RuntimeProfile {
                extensions: &["py"],
                runtime: Some("python"),
                os_tools: &["py3-pip"],
                specific_tools: &[("bandit", None)],
                trailing: &[
                    "WORKDIR /usr/src/app",
                    "RUN pip install --no-cache-dir -r requirements.txt || true",
                    "RUN pip install bandit",
                    "RUN bandit -f html -o result.html -r . || true",
                ],
                host_tools: &["python3"],
                portable: true,
            },
            Language::R => RuntimeProfile {
                extensions: &["r"],
                runtime: Some("ubuntu"),
                os_tools: &["r-base"],
                specific_tools: &[],
                trailing: &["WORKDIR /home/r/app"],
                host_tools: &["R"],
                portable: false,
            },
            Language::Ruby => RuntimeProfile {
                extensions: &["rb"],
                runtime: Some("ruby"),
                os_tools: &[],
                specific_tools: &[("brakeman", None), ("reek", None)],
                trailing: &[
                    "WORKDIR /usr/src/app",
                    "RUN bundle install",
                    "RUN reek -t -f html . > result.html || true",
                ],
                host_tools: &["ruby"],
                portable: true,
            },
            Language::Rust => RuntimeProfile {
                extensions: &["rs"],
                runtime: Some("rust"),
                os_tools: &[],
                specific_tools: &[],
                trailing: &[
                    "WORKDIR /usr/src/rust/app",
                    "RUN rustup component add clippy",
                    "RUN cargo clippy 2> result.txt || true",
                ],
                host_tools: &["rust", "cargo"],
                portable: false,
            },
            Language::Scala => RuntimeProfile {
                extensions: &["scala"],
                runtime: Some("ubuntu"),
                os_tools: &["scala"],
                specific_tools: &[],
                trailing: &["WORKDIR /home/scala/app"],
                host_tools: &["scala"],
                portable: false,
            },
            Language::Shell => RuntimeProfile {
                extensions: &["sh"],
                runtime: Some("bash"),
                os_tools: &["shellcheck"],
                specific_tools: &[],
                trailing: &[
                    "WORKDIR /home/shell/app",
                    "RUN shellcheck ./*.sh > result.txt || true",
                ],
                host_tools: &["ShellCheck"],
                portable: true,
            },
            Language::Smalltalk => RuntimeProfile {
                extensions: &["st"],
                runtime: Some("ubuntu"),
                os_tools: &["gnu-smalltalk"],
                specific_tools: &[],
                trailing: &["WORKDIR /home/smalltalk/app"],
                host_tools: &["gst"],
                portable: false,
            },
            Language::Sql => RuntimeProfile {
                extensions: &["sql"],
                runtime: Some("ubuntu"),
                os_tools: &["ruby", "wget"],
                specific_tools: &[("sqlint", None)],
                trailing: &[
                    "RUN wget -q https://github.com/jarulraj/sqlcheck/releases/download/v1.2/sqlcheck-x86_64.deb",
                    "RUN dpkg -i sqlcheck-x86_64.deb",
                    "RUN gem install sqlint",
                    "WORKDIR /home/sql/app",
                    "RUN sqlcheck -f . > result.txt || true",
                ],
                host_tools: &["ruby"],
                portable: true,
            },
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
